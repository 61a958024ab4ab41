use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;

use crate::domain::Provider;

pub const MAX_TITLE_TOKENS: u32 = 100;

/// Failures the pipeline reports differently from a plain provider error.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("provider returned no title text")]
    EmptyReply,
}

/// One external title-generation service.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}

pub fn build_prompt(keyword: &str, top_terms: &[String], instructions: &str) -> String {
    format!(
        "Based on analysis of top-ranking titles for the keyword '{}',\nthe most common terms are: {}.\n\n{}",
        keyword,
        top_terms.iter().join(", "),
        instructions.trim()
    )
}

/// Trims the model's reply and strips the quotes models like to wrap titles in.
pub fn clean_generated_title(raw: &str) -> Result<String> {
    let title = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    if title.is_empty() {
        return Err(GenerationError::EmptyReply.into());
    }
    Ok(title.to_string())
}
