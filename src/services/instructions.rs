use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::configuration::InstructionSettings;

pub const DEFAULT_INSTRUCTIONS: &str = "Create a unique and engaging title tag (max 75 characters) that:
1. Incorporates 2-3 of the most relevant common terms
2. Adds a unique angle or perspective
3. Maintains search intent
4. Includes the main keyword naturally
5. Avoid using dates and/or years";

/// Instruction text kept between runs: the operator's current edit, and the
/// shipped default it can be reset to.
#[derive(Debug, Clone)]
pub struct InstructionStore {
    current_path: PathBuf,
    default_path: PathBuf,
}

impl InstructionStore {
    pub fn new(settings: &InstructionSettings) -> Self {
        InstructionStore {
            current_path: PathBuf::from(&settings.current_path),
            default_path: PathBuf::from(&settings.default_path),
        }
    }

    /// Current instructions, else the default file, else the built-in text.
    pub async fn load(&self) -> String {
        if let Ok(current) = tokio::fs::read_to_string(&self.current_path).await {
            return current;
        }
        match self.default_instructions().await {
            Some(default) => default,
            None => DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    pub async fn default_instructions(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.default_path).await {
            Ok(default) => Some(default),
            Err(e) => {
                log::warn!(
                    "Default instructions unavailable at {}: {}",
                    self.default_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Stores `instructions` as current unless they match the default file.
    /// Returns whether anything was written.
    pub async fn save_if_changed(&self, instructions: &str) -> Result<bool> {
        if self.default_instructions().await.as_deref() == Some(instructions) {
            return Ok(false);
        }

        tokio::fs::write(&self.current_path, instructions)
            .await
            .with_context(|| format!("writing {}", self.current_path.display()))?;
        Ok(true)
    }
}
