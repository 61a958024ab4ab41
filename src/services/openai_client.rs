use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use crate::domain::Provider;

use super::title_generator::{clean_generated_title, TitleGenerator, MAX_TITLE_TOKENS};

const MODEL: &str = "gpt-4o-2024-11-20";
const SYSTEM_PROMPT: &str = "You are an SEO expert specialized in creating optimized title tags. Return only the title without quotes.";

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
}

impl OpenaiClient {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl TitleGenerator for OpenaiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(MODEL)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .max_tokens(MAX_TITLE_TOKENS)
            .temperature(temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;
        log::debug!("Response: {:?}", response);

        let first_choice = response
            .choices
            .first()
            .context("No choices in Openai response")?
            .message
            .content
            .clone()
            .context("No content")?;

        let title = clean_generated_title(&first_choice)?;
        log::info!("GPT-4 generated title: {}", title);
        Ok(title)
    }
}
