use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::domain::SessionState;

use super::droid::BrowserSession;

/// Session state persisted as one JSON file per site. Concurrent writers for
/// the same site overwrite each other; the last one wins.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SessionStore { dir: dir.into() }
    }

    pub fn path_for(&self, site: &str) -> PathBuf {
        let file_name: String = site
            .chars()
            .map(|c| match c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                true => c,
                false => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }

    /// Stored state for `site`. Missing, unreadable or malformed files all
    /// come back as `None`.
    pub async fn load(&self, site: &str) -> Option<SessionState> {
        let path = self.path_for(site);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No stored session state for {}", site);
                return None;
            }
            Err(e) => {
                log::warn!("Failed to read session state {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<SessionState>(&content) {
            Ok(state) if state.site == site => {
                log::info!("Found {} stored cookies for {}", state.cookies.len(), site);
                Some(state)
            }
            Ok(state) => {
                log::warn!(
                    "Ignoring session state in {} recorded for {}",
                    path.display(),
                    state.site
                );
                None
            }
            Err(e) => {
                log::warn!("Failed to parse session state {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, state: &SessionState) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.path_for(&state.site);
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        log::info!(
            "Saved {} cookies for {} to {}",
            state.cookies.len(),
            state.site,
            path.display()
        );
        Ok(path)
    }

    /// Applies stored cookies for `site` to `session`. WebDriver only accepts
    /// cookies for the current origin, so `origin` is visited first. Returns
    /// how many cookies were applied; entries the engine refuses are skipped.
    pub async fn restore(&self, site: &str, session: &dyn BrowserSession, origin: &str) -> usize {
        let Some(state) = self.load(site).await else {
            return 0;
        };
        if state.is_empty() {
            return 0;
        }

        if let Err(e) = session.goto(origin).await {
            log::warn!("Could not open {} to restore cookies: {:#}", origin, e);
            return 0;
        }

        let mut applied = 0;
        for cookie in state.cookies {
            match session.add_cookie(cookie).await {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("Skipping stored cookie: {:#}", e),
            }
        }
        log::info!("Restored {} cookies for {}", applied, site);
        applied
    }
}
