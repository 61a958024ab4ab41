use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::Provider;

use super::title_generator::{
    clean_generated_title, GenerationError, TitleGenerator, MAX_TITLE_TOKENS,
};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-7-sonnet-20250219";
const SYSTEM_PROMPT: &str = "You are an SEO expert. Generate only the title tag without any additional text or explanation.";

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(AnthropicClient {
            client,
            api_key,
            url: MESSAGES_URL.to_string(),
        })
    }
}

#[async_trait]
impl TitleGenerator for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TITLE_TOKENS,
            temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<MessagesResponse>()
            .await?;
        log::debug!("Response: {:?}", response);

        let text = first_text(&response).ok_or(GenerationError::EmptyReply)?;
        let title = clean_generated_title(text)?;
        log::info!("Claude generated title: {}", title);
        Ok(title)
    }
}

fn first_text(response: &MessagesResponse) -> Option<&str> {
    response
        .content
        .iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text.as_deref())
}
