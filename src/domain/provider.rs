use serde::Serialize;

/// External title-generation services the pipeline knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Anthropic];

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "GPT-4o",
            Provider::Anthropic => "Claude 3.7 Sonnet",
        }
    }

    /// Field name used for this provider's title in the HTTP response.
    pub fn response_key(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt4_title",
            Provider::Anthropic => "claude_title",
        }
    }

    pub fn missing_credential_message(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI API key not provided",
            Provider::Anthropic => "Anthropic API key not provided",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Provider::OpenAi => "Error generating title with GPT-4",
            Provider::Anthropic => "Error generating title with Claude",
        }
    }

    pub fn empty_reply_message(&self) -> &'static str {
        match self {
            Provider::OpenAi => "Error: GPT-4 did not generate a title",
            Provider::Anthropic => "Error: Claude did not generate a title",
        }
    }
}
