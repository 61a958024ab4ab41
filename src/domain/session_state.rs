use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Browser cookies captured after an operator cleared a challenge.
///
/// Cookies are kept in the engine's own JSON shape and never inspected here;
/// entries the engine no longer accepts are skipped when the state is reapplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub site: String,
    pub captured_at: DateTime<Utc>,
    pub cookies: Vec<serde_json::Value>,
}

impl SessionState {
    pub fn new(site: impl Into<String>, cookies: Vec<serde_json::Value>) -> Self {
        SessionState {
            site: site.into(),
            captured_at: Utc::now(),
            cookies,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
