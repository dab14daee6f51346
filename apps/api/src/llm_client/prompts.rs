// Shared prompt constants.
// Each service that needs model calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System instruction fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only, matching the response schema you were given. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
