use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Api(#[from] OpenAIError),
}

/// A single-turn chat completion: one system instruction, one user message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the first choice's text, or an empty string when the provider
    /// sent no content.
    async fn complete(&self, system: &str, user: &str, temperature: f32)
        -> Result<String, LlmError>;
}

/// Chat client for any OpenAI-compatible endpoint (OpenRouter by default).
pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenaiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl ChatModel for OpenaiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()?
                    .into(),
            ])
            .temperature(temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;
        log::debug!("Completion {} from model {}", response.id, response.model);

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}
