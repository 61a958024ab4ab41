// Test doubles for the browser, operator and provider seams.
//
// Every double records what was asked of it so tests can assert on call
// order and call counts without a WebDriver or network.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::domain::{Provider, SearchTitle};

use super::{
    challenge::ResolutionSignal,
    droid::{Browser, BrowserSession, PageElement, RenderedPage, StaticPage},
    pipeline::TitleAcquirer,
    title_generator::{GenerationError, TitleGenerator},
};

// =============================================================================
// Event log
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.starts_with(prefix))
    }
}

// =============================================================================
// Scripted browser
// =============================================================================

struct ScriptedPage {
    html: String,
    reachable: bool,
}

/// Hands out one scripted page per launch, in the order they were added.
/// Launching with no scripted pages left fails.
pub struct ScriptedBrowser {
    pages: Mutex<VecDeque<ScriptedPage>>,
    cookies: Vec<serde_json::Value>,
    launches: AtomicUsize,
    events: EventLog,
}

impl ScriptedBrowser {
    pub fn new(events: EventLog) -> Self {
        ScriptedBrowser {
            pages: Mutex::new(VecDeque::new()),
            cookies: vec![],
            launches: AtomicUsize::new(0),
            events,
        }
    }

    pub fn with_page(self, html: &str) -> Self {
        self.push(html, true)
    }

    /// A session whose navigation always fails.
    pub fn with_unreachable_page(self) -> Self {
        self.push("", false)
    }

    pub fn with_cookies(mut self, cookies: Vec<serde_json::Value>) -> Self {
        self.cookies = cookies;
        self
    }

    fn push(self, html: &str, reachable: bool) -> Self {
        self.pages.lock().unwrap().push_back(ScriptedPage {
            html: html.to_string(),
            reachable,
        });
        self
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserSession>> {
        self.events.record(format!("launch headless={}", headless));
        let page = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted session left"))?;
        let id = self.launches.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(Box::new(ScriptedSession {
            id,
            page: StaticPage::new(page.html),
            reachable: page.reachable,
            cookies: self.cookies.clone(),
            events: self.events.clone(),
        }))
    }
}

pub struct ScriptedSession {
    id: usize,
    page: StaticPage,
    reachable: bool,
    cookies: Vec<serde_json::Value>,
    events: EventLog,
}

#[async_trait]
impl RenderedPage for ScriptedSession {
    async fn page_source(&self) -> Result<String> {
        self.events.record(format!("page_source #{}", self.id));
        self.page.page_source().await
    }

    async fn find_all(&self, scope: Option<&str>, selector: &str) -> Result<Vec<PageElement>> {
        self.events
            .record(format!("find_all #{} {}", self.id, selector));
        self.page.find_all(scope, selector).await
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    fn as_page(&self) -> &dyn RenderedPage {
        self
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.events.record(format!("goto #{} {}", self.id, url));
        match self.reachable {
            true => Ok(()),
            false => Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url)),
        }
    }

    async fn scroll_to(&self, y: u32) -> Result<()> {
        self.events.record(format!("scroll #{} {}", self.id, y));
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<serde_json::Value>> {
        self.events.record(format!("cookies #{}", self.id));
        Ok(self.cookies.clone())
    }

    async fn add_cookie(&self, cookie: serde_json::Value) -> Result<()> {
        match cookie.get("name").and_then(|n| n.as_str()) {
            Some(name) => {
                self.events
                    .record(format!("add_cookie #{} {}", self.id, name));
                Ok(())
            }
            None => Err(anyhow!("cookie without a name")),
        }
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        self.events.record(format!("quit #{}", self.id));
        Ok(())
    }
}

/// Resolves immediately, recording that the operator was waited on.
pub struct ScriptedSignal {
    events: EventLog,
}

impl ScriptedSignal {
    pub fn new(events: EventLog) -> Self {
        ScriptedSignal { events }
    }
}

#[async_trait]
impl ResolutionSignal for ScriptedSignal {
    async fn wait_for_resolution(&self) -> Result<()> {
        self.events.record("await resolution");
        Ok(())
    }
}

// =============================================================================
// Pipeline collaborators
// =============================================================================

pub struct MockAcquirer {
    titles: Vec<SearchTitle>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockAcquirer {
    pub fn new(titles: Vec<SearchTitle>) -> Self {
        MockAcquirer {
            titles,
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TitleAcquirer for MockAcquirer {
    async fn acquire(&self, keyword: &str, max_results: usize) -> Vec<SearchTitle> {
        self.calls
            .lock()
            .unwrap()
            .push((keyword.to_string(), max_results));
        self.titles.iter().take(max_results).cloned().collect()
    }
}

/// Prompt and temperature of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCall {
    pub prompt: String,
    pub temperature: f32,
}

pub struct MockTitleGenerator {
    provider: Provider,
    response: std::result::Result<String, String>,
    calls: Arc<Mutex<Vec<GenerateCall>>>,
}

impl MockTitleGenerator {
    pub fn replying(provider: Provider, title: &str) -> Self {
        Self::new(provider, Ok(title.to_string()))
    }

    pub fn failing(provider: Provider, error: &str) -> Self {
        Self::new(provider, Err(error.to_string()))
    }

    /// Answers without any title text.
    pub fn empty(provider: Provider) -> Self {
        Self::new(provider, Ok(String::new()))
    }

    fn new(provider: Provider, response: std::result::Result<String, String>) -> Self {
        MockTitleGenerator {
            provider,
            response,
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TitleGenerator for MockTitleGenerator {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push(GenerateCall {
            prompt: prompt.to_string(),
            temperature,
        });
        match &self.response {
            Ok(title) if title.is_empty() => Err(GenerationError::EmptyReply.into()),
            Ok(title) => Ok(title.clone()),
            Err(e) => Err(anyhow!(e.clone())),
        }
    }
}
