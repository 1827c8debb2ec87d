use serde::{Deserialize, Serialize};

/// Request body for the chat stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's text.
    pub message: String,
}

impl ChatRequest {
    /// Create a new `ChatRequest` for the given text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
