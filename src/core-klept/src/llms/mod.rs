pub mod deepseek;
pub mod mock;

use async_trait::async_trait;

pub use deepseek::DeepSeek;

use crate::errors::Result;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What a completion produced for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// The reformatted page content.
    pub content: String,
    /// The model's reasoning, when the provider exposes it.
    pub reasoning_trace: Option<String>,
    /// Total tokens billed for the call.
    pub tokens_consumed: u32,
}

/// Interface to a hosted LLM that completes a chat and awaits the response.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_role: &str, messages: &[ChatMessage]) -> Result<ExtractionResult>;
}
