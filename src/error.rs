use std::time::Duration;

/// Ways a scraping run can fail. None of these reach the pipeline's caller:
/// the acquisition controller logs them and yields no titles.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("failed to launch browser session: {0:#}")]
    Launch(anyhow::Error),
    #[error("invalid search url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("navigation failed: {0:#}")]
    Navigation(anyhow::Error),
    #[error("failed to read rendered page: {0:#}")]
    PageRead(anyhow::Error),
    #[error("no live browser session")]
    NoSession,
    #[error("manual challenge resolution failed: {0:#}")]
    Resolution(anyhow::Error),
    #[error("page still shows '{0}' after manual resolution")]
    StillChallenged(String),
    #[error("gave up waiting for manual challenge resolution after {0:?}")]
    ResolutionTimedOut(Duration),
    #[error("failed to tear down browser session: {0:#}")]
    Teardown(anyhow::Error),
}
