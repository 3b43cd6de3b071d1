use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::llms::{ChatMessage, CompletionProvider, ExtractionResult, Role};

/// DeepSeek's OpenAI-compatible endpoint.
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com";

/// The chat model performs better at clean extraction than the reasoning model.
pub const DEEPSEEK_CHAT_MODEL: &str = "deepseek-chat";

/// LLM calls can take a while.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(300);

/// `CompletionProvider` for DeepSeek, spoken through the OpenAI client.
#[derive(Clone)]
pub struct DeepSeek {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl DeepSeek {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        Self::with_api_base(api_key, DEEPSEEK_API_BASE, timeout)
    }

    /// Points the client at another OpenAI-compatible endpoint.
    pub fn with_api_base(api_key: &str, api_base: &str, timeout: Duration) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model: DEEPSEEK_CHAT_MODEL.to_string(),
            timeout,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

impl std::fmt::Debug for DeepSeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeek")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let converted = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
    };
    Ok(converted)
}

/// The parts of a DeepSeek chat response that are used. Unlike the typed OpenAI
/// response, the message keeps DeepSeek's `reasoning_content`.
#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    choices: Vec<DeepSeekChoice>,
    usage: Option<DeepSeekUsage>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekChoice {
    message: DeepSeekMessage,
}

#[derive(Debug, Deserialize)]
struct DeepSeekMessage {
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekUsage {
    total_tokens: u32,
}

impl TryFrom<DeepSeekResponse> for ExtractionResult {
    type Error = Error;

    fn try_from(response: DeepSeekResponse) -> Result<Self> {
        let tokens_consumed = response.usage.map(|u| u.total_tokens).unwrap_or(0);
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| Error::Completion("No choices in completion response".to_string()))?;
        let content = message
            .content
            .ok_or_else(|| Error::Completion("No content in completion response".to_string()))?;

        Ok(ExtractionResult {
            content,
            reasoning_trace: message.reasoning_content.filter(|r| !r.trim().is_empty()),
            tokens_consumed,
        })
    }
}

#[async_trait]
impl CompletionProvider for DeepSeek {
    async fn complete(&self, system_role: &str, messages: &[ChatMessage]) -> Result<ExtractionResult> {
        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(to_request_message(&ChatMessage::system(system_role))?);
        for message in messages {
            request_messages.push(to_request_message(message)?);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(request_messages)
            .build()?;

        let response: DeepSeekResponse = tokio::time::timeout(self.timeout, self.client.chat().create_byot(request))
            .await
            .map_err(|_| Error::CompletionTimeout(self.timeout))??;

        response.try_into()
    }
}
