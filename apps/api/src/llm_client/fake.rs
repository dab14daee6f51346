//! Scripted model for tests.
//!
//! Returns queued generations in order and records every prompt it receives,
//! so tests can assert on both the rendered prompt and the call count.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Diagnostics, GenerateRequest, Generation, GenerativeModel, LlmError};

#[derive(Default)]
pub struct FakeModel {
    replies: Mutex<VecDeque<Result<Generation, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    /// A model whose next reply is `output` with a normal finish.
    pub fn with_output(output: Value) -> Self {
        let model = Self::default();
        model.push(Ok(Generation {
            output: Some(output.clone()),
            diagnostics: Diagnostics {
                finish_reason: Some("STOP".to_string()),
                ..Diagnostics::default()
            },
            raw: output,
        }));
        model
    }

    /// A model whose next reply carries no output, only diagnostics.
    pub fn with_no_output(diagnostics: Diagnostics) -> Self {
        let model = Self::default();
        model.push(Ok(Generation {
            output: None,
            diagnostics,
            raw: serde_json::json!({"candidates": []}),
        }));
        model
    }

    /// A model whose next call fails at the transport level.
    pub fn with_error(error: LlmError) -> Self {
        let model = Self::default();
        model.push(Err(error));
        model
    }

    pub fn push(&self, reply: Result<Generation, LlmError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<Generation, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Api {
                    status: 500,
                    message: "FakeModel has no scripted reply".to_string(),
                })
            })
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}
