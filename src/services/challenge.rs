use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Notify,
};
use url::Url;

use crate::{configuration::ChallengeSettings, domain::SessionState, error::AcquisitionError};

use super::{
    droid::{Browser, BrowserSession, RenderedPage, SessionGuard},
    session_store::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Normal,
    ChallengeDetected,
    AwaitingManualResolution,
    Resolved,
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeState::Normal => "normal",
            ChallengeState::ChallengeDetected => "challenge detected",
            ChallengeState::AwaitingManualResolution => "awaiting manual resolution",
            ChallengeState::Resolved => "resolved",
        };
        write!(f, "{}", name)
    }
}

/// The operator's confirmation that a challenge has been solved in the
/// observable browser window.
#[async_trait]
pub trait ResolutionSignal: Send + Sync {
    async fn wait_for_resolution(&self) -> Result<()>;
}

/// Confirmation typed on the terminal running the process.
pub struct StdinConfirmation;

#[async_trait]
impl ResolutionSignal for StdinConfirmation {
    async fn wait_for_resolution(&self) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(b"Solve the challenge in the browser window, then press Enter to continue...\n")
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            anyhow::bail!("stdin closed before the challenge was confirmed");
        }
        Ok(())
    }
}

/// Confirmation delivered from elsewhere in the process, e.g. an HTTP handler.
/// Only runs already waiting are released; a resolution sent while nobody
/// waits is dropped so it cannot approve a later challenge.
#[derive(Default)]
pub struct OperatorSignal {
    notify: Notify,
    waiting: AtomicUsize,
}

impl OperatorSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst) > 0
    }

    /// Releases every waiting run. Returns `false` when there was none.
    pub fn resolve(&self) -> bool {
        if !self.is_waiting() {
            return false;
        }
        self.notify.notify_waiters();
        true
    }
}

/// Counts a waiter for as long as it is alive, including when the wait is
/// cancelled by a timeout.
struct PendingWait<'a> {
    waiting: &'a AtomicUsize,
}

impl<'a> PendingWait<'a> {
    fn register(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::SeqCst);
        PendingWait { waiting }
    }
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResolutionSignal for OperatorSignal {
    async fn wait_for_resolution(&self) -> Result<()> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Registered with the Notify before becoming visible to `resolve`
        notified.as_mut().enable();
        let _pending = PendingWait::register(&self.waiting);

        log::warn!("Waiting for the operator: solve the challenge, then POST /challenge/resolve");
        notified.await;
        Ok(())
    }
}

/// Case-insensitive scan of page source for bot-detection wording.
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    phrases: Vec<String>,
}

impl ChallengeDetector {
    pub fn new(phrases: &[String]) -> Self {
        ChallengeDetector {
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// First configured phrase found in `page_source`.
    pub fn detect(&self, page_source: &str) -> Option<&str> {
        let page_source = page_source.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| page_source.contains(phrase.as_str()))
            .map(|phrase| phrase.as_str())
    }
}

/// States a run passed through, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeReport {
    pub transitions: Vec<ChallengeState>,
}

impl ChallengeReport {
    fn new() -> Self {
        ChallengeReport {
            transitions: vec![ChallengeState::Normal],
        }
    }

    fn transition(&mut self, next: ChallengeState) {
        log::info!("Challenge state: {} -> {}", self.state(), next);
        self.transitions.push(next);
    }

    pub fn state(&self) -> ChallengeState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(ChallengeState::Normal)
    }

    pub fn was_challenged(&self) -> bool {
        self.transitions.contains(&ChallengeState::ChallengeDetected)
    }
}

/// Escalates a blocked headless session to an observable one, waits for the
/// operator and keeps the resulting cookies for later runs. Cookies are only
/// kept once the page no longer shows a challenge.
pub struct ChallengeHandler {
    detector: ChallengeDetector,
    signal: Arc<dyn ResolutionSignal>,
    resolution_timeout: Option<Duration>,
}

impl ChallengeHandler {
    pub fn new(settings: &ChallengeSettings, signal: Arc<dyn ResolutionSignal>) -> Self {
        ChallengeHandler {
            detector: ChallengeDetector::new(&settings.phrases),
            signal,
            resolution_timeout: settings.resolution_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Inspects the page in `guard` and, if it is a challenge, swaps the
    /// session for an observable one on `url` and blocks until the operator
    /// resolves it. On return the guard holds the session to extract from.
    pub async fn handle(
        &self,
        guard: &mut SessionGuard,
        browser: &dyn Browser,
        url: &str,
        site: &str,
        store: &SessionStore,
    ) -> Result<ChallengeReport, AcquisitionError> {
        let mut report = ChallengeReport::new();

        let page_source = guard
            .session()?
            .page_source()
            .await
            .map_err(AcquisitionError::PageRead)?;
        let Some(phrase) = self.detector.detect(&page_source) else {
            return Ok(report);
        };

        log::warn!("Found bot detection sign: '{}'", phrase);
        report.transition(ChallengeState::ChallengeDetected);

        let observable = browser
            .launch(false)
            .await
            .map_err(AcquisitionError::Launch)?;
        guard.replace(observable).await;

        let origin = Url::parse(url)?.origin().ascii_serialization();
        store.restore(site, guard.session()?, &origin).await;
        guard
            .session()?
            .goto(url)
            .await
            .map_err(AcquisitionError::Navigation)?;

        report.transition(ChallengeState::AwaitingManualResolution);
        self.await_operator().await?;

        let page_source = guard
            .session()?
            .page_source()
            .await
            .map_err(AcquisitionError::PageRead)?;
        if let Some(phrase) = self.detector.detect(&page_source) {
            return Err(AcquisitionError::StillChallenged(phrase.to_string()));
        }

        report.transition(ChallengeState::Resolved);
        self.persist_session_state(guard, site, store).await;

        Ok(report)
    }

    async fn await_operator(&self) -> Result<(), AcquisitionError> {
        match self.resolution_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.signal.wait_for_resolution())
                .await
                .map_err(|_| AcquisitionError::ResolutionTimedOut(timeout))?
                .map_err(AcquisitionError::Resolution),
            None => self
                .signal
                .wait_for_resolution()
                .await
                .map_err(AcquisitionError::Resolution),
        }
    }

    async fn persist_session_state(&self, guard: &SessionGuard, site: &str, store: &SessionStore) {
        let cookies = match guard.session() {
            Ok(session) => session.cookies().await,
            Err(e) => Err(e.into()),
        };

        match cookies {
            Ok(cookies) => {
                if let Err(e) = store.save(&SessionState::new(site, cookies)).await {
                    log::error!("Failed to persist session state for {}: {:#}", site, e);
                }
            }
            Err(e) => log::error!("Failed to read cookies after challenge: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::services::testing::{EventLog, ScriptedBrowser, ScriptedSignal};

    const CHALLENGE_PAGE: &str = r#"<html><body>
        <form id="captcha-form">Our systems have detected Unusual Traffic from your computer network.</form>
    </body></html>"#;
    const RESULTS_PAGE: &str =
        r#"<html><body><div id="search"><h3>Trail Running Shoes</h3></div></body></html>"#;
    const SEARCH_URL: &str = "https://www.google.com/search?q=trail+shoes";

    fn settings() -> ChallengeSettings {
        ChallengeSettings::default()
    }

    fn scratch_store() -> (SessionStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (SessionStore::new(dir.path()), dir)
    }

    #[test]
    fn detector_is_case_insensitive() {
        let detector = ChallengeDetector::new(&settings().phrases);

        assert_eq!(detector.detect(CHALLENGE_PAGE), Some("unusual traffic"));
        assert_eq!(detector.detect("Please Verify You Are A Human"), Some("verify you are a human"));
        assert_eq!(detector.detect(RESULTS_PAGE), None);
    }

    #[tokio::test]
    async fn clean_page_stays_normal() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone()).with_page(RESULTS_PAGE);
        let signal = Arc::new(ScriptedSignal::new(events.clone()));
        let handler = ChallengeHandler::new(&settings(), signal);
        let (store, _dir) = scratch_store();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let report = handler
            .handle(&mut guard, &browser, SEARCH_URL, "google.com", &store)
            .await
            .unwrap();

        assert_eq!(report.transitions, vec![ChallengeState::Normal]);
        assert!(!events.contains("await resolution"));
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn challenge_escalates_waits_and_persists_cookies() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(RESULTS_PAGE)
            .with_cookies(vec![serde_json::json!({"name": "GOOGLE_ABUSE_EXEMPTION", "value": "ID=1"})]);
        let signal = Arc::new(ScriptedSignal::new(events.clone()));
        let handler = ChallengeHandler::new(&settings(), signal);
        let (store, _dir) = scratch_store();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let report = handler
            .handle(&mut guard, &browser, SEARCH_URL, "google.com", &store)
            .await
            .unwrap();

        assert_eq!(
            report.transitions,
            vec![
                ChallengeState::Normal,
                ChallengeState::ChallengeDetected,
                ChallengeState::AwaitingManualResolution,
                ChallengeState::Resolved,
            ]
        );
        assert_eq!(
            events.snapshot(),
            vec![
                "launch headless=true".to_string(),
                "page_source #1".to_string(),
                "launch headless=false".to_string(),
                "quit #1".to_string(),
                format!("goto #2 {}", SEARCH_URL),
                "await resolution".to_string(),
                "page_source #2".to_string(),
                "cookies #2".to_string(),
            ]
        );

        let saved = store.load("google.com").await.unwrap();
        assert_eq!(saved.cookies.len(), 1);

        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn escalated_session_gets_stored_cookies_before_the_search() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(RESULTS_PAGE);
        let handler = ChallengeHandler::new(&settings(), Arc::new(ScriptedSignal::new(events.clone())));
        let (store, _dir) = scratch_store();
        store
            .save(&SessionState::new(
                "google.com",
                vec![serde_json::json!({"name": "NID", "value": "511=abc"})],
            ))
            .await
            .unwrap();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        handler
            .handle(&mut guard, &browser, SEARCH_URL, "google.com", &store)
            .await
            .unwrap();

        let restored = events.position("add_cookie #2 NID").unwrap();
        let searched = events.position(&format!("goto #2 {}", SEARCH_URL)).unwrap();
        assert!(events.contains("goto #2 https://www.google.com"));
        assert!(restored < searched);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn page_still_challenged_after_resolution_is_not_persisted() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(CHALLENGE_PAGE)
            .with_cookies(vec![serde_json::json!({"name": "NID", "value": "blocked"})]);
        let handler = ChallengeHandler::new(&settings(), Arc::new(ScriptedSignal::new(events.clone())));
        let (store, _dir) = scratch_store();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let result = handler
            .handle(&mut guard, &browser, SEARCH_URL, "google.com", &store)
            .await;

        assert!(matches!(result, Err(AcquisitionError::StillChallenged(_))));
        assert!(!events.contains("cookies #2"));
        assert_eq!(store.load("google.com").await, None);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn operator_timeout_gives_up() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(CHALLENGE_PAGE);
        let settings = ChallengeSettings {
            resolution_timeout_secs: Some(0),
            ..settings()
        };
        let handler = ChallengeHandler::new(&settings, Arc::new(OperatorSignal::new()));
        let (store, _dir) = scratch_store();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let result = handler
            .handle(&mut guard, &browser, SEARCH_URL, "google.com", &store)
            .await;

        assert!(matches!(result, Err(AcquisitionError::ResolutionTimedOut(_))));
        assert_eq!(store.load("google.com").await, None);
        guard.release().await.unwrap();
        assert!(events.contains("quit #2"));
    }

    #[tokio::test]
    async fn resolution_sent_before_a_challenge_is_ignored() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(CHALLENGE_PAGE);
        let signal = Arc::new(OperatorSignal::new());
        let handler = ChallengeHandler::new(&settings(), signal.clone());
        let (store, _dir) = scratch_store();

        assert!(!signal.resolve());

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let waited = tokio::time::timeout(
            Duration::from_millis(200),
            handler.handle(&mut guard, &browser, SEARCH_URL, "google.com", &store),
        )
        .await;

        assert!(waited.is_err(), "a stale resolution must not release the run");
        assert!(!signal.is_waiting());
        assert!(!events.contains("cookies #2"));
        assert_eq!(store.load("google.com").await, None);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn resolution_releases_a_waiting_run() {
        let events = EventLog::default();
        let browser = ScriptedBrowser::new(events.clone())
            .with_page(CHALLENGE_PAGE)
            .with_page(RESULTS_PAGE)
            .with_cookies(vec![serde_json::json!({"name": "GOOGLE_ABUSE_EXEMPTION", "value": "ID=1"})]);
        let signal = Arc::new(OperatorSignal::new());
        let handler = ChallengeHandler::new(&settings(), signal.clone());
        let (store, _dir) = scratch_store();

        let mut guard = SessionGuard::new(browser.launch(true).await.unwrap());
        let operator = async {
            while !signal.is_waiting() {
                tokio::task::yield_now().await;
            }
            signal.resolve()
        };
        let (report, resolved) = tokio::time::timeout(
            Duration::from_secs(2),
            async {
                tokio::join!(
                    handler.handle(&mut guard, &browser, SEARCH_URL, "google.com", &store),
                    operator
                )
            },
        )
        .await
        .unwrap();

        assert!(resolved);
        assert_eq!(report.unwrap().state(), ChallengeState::Resolved);
        assert!(!signal.is_waiting());
        assert_eq!(store.load("google.com").await.unwrap().cookies.len(), 1);
        guard.release().await.unwrap();
    }
}
