use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use url::Url;

use crate::{
    configuration::ScraperSettings,
    domain::SearchTitle,
    error::AcquisitionError,
};

use super::{
    challenge::ChallengeHandler,
    droid::{Browser, BrowserSession, RenderedPage, SessionGuard},
    pipeline::TitleAcquirer,
    session_store::SessionStore,
    title_extractor::TitleExtractor,
};

/// Random pauses and scrolls around navigation, drawn up front so no RNG is
/// held across an await.
struct Pacing {
    before_navigation: Duration,
    after_navigation: Duration,
    scrolls: Vec<(u32, Duration)>,
}

impl Pacing {
    fn human() -> Self {
        let mut rng = rand::thread_rng();
        let scroll_count = rng.gen_range(2..=4);
        Pacing {
            before_navigation: Duration::from_millis(rng.gen_range(3_000..5_000)),
            after_navigation: Duration::from_millis(rng.gen_range(2_000..4_000)),
            scrolls: (0..scroll_count)
                .map(|_| {
                    (
                        rng.gen_range(100..=500),
                        Duration::from_millis(rng.gen_range(500..1_500)),
                    )
                })
                .collect(),
        }
    }
}

/// Fetches result titles for a keyword from a live search results page.
pub struct GoogleScraper {
    browser: Arc<dyn Browser>,
    headless: bool,
    extractor: TitleExtractor,
    challenge: ChallengeHandler,
    store: SessionStore,
    settings: ScraperSettings,
}

impl GoogleScraper {
    pub fn new(
        browser: Arc<dyn Browser>,
        headless: bool,
        settings: &ScraperSettings,
        challenge: ChallengeHandler,
    ) -> Self {
        GoogleScraper {
            browser,
            headless,
            extractor: TitleExtractor::new(settings),
            challenge,
            store: SessionStore::new(&settings.session_state_dir),
            settings: settings.clone(),
        }
    }

    pub fn search_url(&self, keyword: &str, max_results: usize) -> Result<Url, AcquisitionError> {
        let num = max_results.to_string();
        let url = Url::parse_with_params(
            &self.settings.search_base_url,
            &[
                ("q", keyword),
                ("num", num.as_str()),
                ("hl", "en"),
                ("safe", "off"),
                ("gl", "US"),
                ("pws", "0"),
                ("ie", "UTF-8"),
                ("oe", "UTF-8"),
            ],
        )?;
        Ok(url)
    }

    async fn scrape(
        &self,
        guard: &mut SessionGuard,
        keyword: &str,
        max_results: usize,
    ) -> Result<Vec<SearchTitle>, AcquisitionError> {
        let url = self.search_url(keyword, max_results)?;
        let pacing = self.settings.human_pacing.then(Pacing::human);

        let origin = url.origin().ascii_serialization();
        self.store
            .restore(&self.settings.target_site, guard.session()?, &origin)
            .await;

        if let Some(pacing) = pacing.as_ref() {
            tokio::time::sleep(pacing.before_navigation).await;
        }
        log::info!("Navigating to: {}", url);
        guard
            .session()?
            .goto(url.as_str())
            .await
            .map_err(AcquisitionError::Navigation)?;
        if let Some(pacing) = pacing.as_ref() {
            self.browse_like_a_human(guard.session()?, pacing).await;
        }

        let report = self
            .challenge
            .handle(guard, self.browser.as_ref(), url.as_str(), &self.settings.target_site, &self.store)
            .await?;
        if report.was_challenged() {
            log::info!("Continuing on the resolved session");
        }

        let page = guard.session()?.as_page();
        let mut titles = self.extractor.extract(page).await;
        if titles.is_empty() {
            self.capture_debug_page(page).await;
        }

        titles.truncate(max_results);
        Ok(titles)
    }

    async fn browse_like_a_human(&self, session: &dyn BrowserSession, pacing: &Pacing) {
        tokio::time::sleep(pacing.after_navigation).await;
        for (y, pause) in pacing.scrolls.iter() {
            if let Err(e) = session.scroll_to(*y).await {
                log::debug!("Scroll failed: {:#}", e);
            }
            tokio::time::sleep(*pause).await;
        }
    }

    async fn capture_debug_page(&self, page: &dyn RenderedPage) {
        let Some(path) = self.settings.debug_page_path.as_ref() else {
            return;
        };

        match page.page_source().await {
            Ok(source) => match tokio::fs::write(path, source).await {
                Ok(()) => log::info!("Saved page source to {}", path),
                Err(e) => log::warn!("Failed to save page source to {}: {}", path, e),
            },
            Err(e) => log::warn!("Failed to read page source for debugging: {:#}", e),
        }
    }
}

#[async_trait]
impl TitleAcquirer for GoogleScraper {
    async fn acquire(&self, keyword: &str, max_results: usize) -> Vec<SearchTitle> {
        let session = match self.browser.launch(self.headless).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("{}", AcquisitionError::Launch(e));
                return vec![];
            }
        };

        let mut guard = SessionGuard::new(session);
        let scraped = self.scrape(&mut guard, keyword, max_results).await;
        let released = guard.release().await;

        match (scraped, released) {
            (Ok(titles), Ok(())) => titles,
            (Ok(_), Err(e)) => {
                log::error!("Discarding results for '{}': {}", keyword, e);
                vec![]
            }
            (Err(e), released) => {
                log::error!("Error getting search results for '{}': {}", keyword, e);
                if let Err(e) = released {
                    log::error!("{}", e);
                }
                vec![]
            }
        }
    }
}
