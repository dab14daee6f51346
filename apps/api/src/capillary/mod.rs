// Capillary tube sizing.
// Implements: request/result contract, prompt rendering, the single model call, export.
// All model calls go through llm_client; no direct vendor API calls here.

pub mod calculator;
pub mod export;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod validation;
