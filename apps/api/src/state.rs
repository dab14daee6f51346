use std::sync::Arc;

use crate::llm_client::GenerativeModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The model every calculation is delegated to. `GeminiClient` in production.
    pub model: Arc<dyn GenerativeModel>,
}
