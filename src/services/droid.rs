use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thirtyfour::{By, ChromiumLikeCapabilities, Cookie, DesiredCapabilities, WebDriver};

use crate::{configuration::BrowserSettings, error::AcquisitionError};

/// A matched element, read out of the page eagerly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub text: String,
    /// `href` of the nearest enclosing `<a>`, if any.
    pub ancestor_href: Option<String>,
}

/// Read access to a rendered page.
#[async_trait]
pub trait RenderedPage: Send + Sync {
    async fn page_source(&self) -> Result<String>;

    /// All elements matching `selector`, searched inside the first element
    /// matching `scope` when one is given.
    async fn find_all(&self, scope: Option<&str>, selector: &str) -> Result<Vec<PageElement>>;
}

/// A live, controllable browser session.
#[async_trait]
pub trait BrowserSession: RenderedPage {
    fn as_page(&self) -> &dyn RenderedPage;

    async fn goto(&self, url: &str) -> Result<()>;

    async fn scroll_to(&self, y: u32) -> Result<()>;

    async fn cookies(&self) -> Result<Vec<serde_json::Value>>;

    async fn add_cookie(&self, cookie: serde_json::Value) -> Result<()>;

    async fn quit(self: Box<Self>) -> Result<()>;
}

/// Launches browser sessions. `headless == false` opens a window an operator can use.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserSession>>;
}

/// Owns the single live session of a scraping run.
///
/// Whoever holds the guard must call [`SessionGuard::release`] on every exit
/// path; replacing the session tears the previous one down first.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        SessionGuard {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Result<&dyn BrowserSession, AcquisitionError> {
        self.session.as_deref().ok_or(AcquisitionError::NoSession)
    }

    pub async fn replace(&mut self, next: Box<dyn BrowserSession>) {
        if let Some(previous) = self.session.replace(next) {
            if let Err(e) = previous.quit().await {
                log::warn!("Failed to quit replaced browser session: {:#}", e);
            }
        }
    }

    pub async fn release(mut self) -> Result<(), AcquisitionError> {
        match self.session.take() {
            Some(session) => session.quit().await.map_err(AcquisitionError::Teardown),
            None => Ok(()),
        }
    }
}

/// Chrome driven over WebDriver.
pub struct Droid {
    settings: BrowserSettings,
}

impl Droid {
    pub fn new(settings: BrowserSettings) -> Self {
        Droid { settings }
    }

    async fn new_driver(&self, headless: bool) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.add_arg("--headless=new")?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--disable-extensions")?;
        caps.add_arg("--disable-infobars")?;
        caps.add_arg("--disable-notifications")?;
        caps.add_arg("--disable-popup-blocking")?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg(&format!(
            "--window-size={},{}",
            self.settings.window_width, self.settings.window_height
        ))?;
        caps.add_arg(&format!("--user-agent={}", self.settings.user_agent))?;
        caps.add_experimental_option("excludeSwitches", vec!["enable-automation"])?;
        caps.add_experimental_option("useAutomationExtension", false)?;

        let driver = WebDriver::new(&self.settings.webdriver_url, caps)
            .await
            .with_context(|| format!("connecting to webdriver at {}", self.settings.webdriver_url))?;
        driver
            .set_page_load_timeout(Duration::from_secs(self.settings.page_load_timeout_secs))
            .await?;

        Ok(driver)
    }
}

#[async_trait]
impl Browser for Droid {
    async fn launch(&self, headless: bool) -> Result<Box<dyn BrowserSession>> {
        log::info!("Launching browser session (headless: {})", headless);
        let driver = self.new_driver(headless).await?;
        Ok(Box::new(DroidSession { driver }))
    }
}

pub struct DroidSession {
    driver: WebDriver,
}

#[async_trait]
impl RenderedPage for DroidSession {
    async fn page_source(&self) -> Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn find_all(&self, scope: Option<&str>, selector: &str) -> Result<Vec<PageElement>> {
        let elements = match scope {
            Some(scope) => {
                let container = self.driver.find(By::Css(scope)).await?;
                container.find_all(By::Css(selector)).await?
            }
            None => self.driver.find_all(By::Css(selector)).await?,
        };

        let mut matched = Vec::with_capacity(elements.len());
        for element in elements {
            let text = element.text().await?;
            let ancestor_href = match element.find(By::XPath("./ancestor::a[1]")).await {
                Ok(a_tag) => a_tag.attr("href").await.ok().flatten(),
                Err(_) => None,
            };
            matched.push(PageElement {
                text,
                ancestor_href,
            });
        }

        Ok(matched)
    }
}

#[async_trait]
impl BrowserSession for DroidSession {
    fn as_page(&self) -> &dyn RenderedPage {
        self
    }

    async fn goto(&self, url: &str) -> Result<()> {
        Ok(self.driver.goto(url).await?)
    }

    async fn scroll_to(&self, y: u32) -> Result<()> {
        self.driver
            .execute(format!("window.scrollTo(0, {});", y), Vec::new())
            .await?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<serde_json::Value>> {
        let cookies = self.driver.get_all_cookies().await?;
        cookies
            .iter()
            .map(|cookie| serde_json::to_value(cookie).map_err(Into::into))
            .collect()
    }

    async fn add_cookie(&self, cookie: serde_json::Value) -> Result<()> {
        let cookie: Cookie = serde_json::from_value(cookie).context("unrecognised cookie")?;
        Ok(self.driver.add_cookie(cookie).await?)
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        Ok(self.driver.quit().await?)
    }
}

/// A page held as static HTML, queried with CSS selectors.
#[derive(Debug, Clone)]
pub struct StaticPage {
    html: String,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        StaticPage { html: html.into() }
    }

    fn select(&self, scope: Option<&str>, selector: &str) -> Result<Vec<PageElement>> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);

        let root = match scope {
            Some(scope) => {
                let scope_selector = parse_selector(scope)?;
                document
                    .select(&scope_selector)
                    .next()
                    .ok_or_else(|| anyhow!("no element matches {}", scope))?
            }
            None => document.root_element(),
        };

        Ok(root
            .select(&selector)
            .map(|element| PageElement {
                text: element.text().collect(),
                ancestor_href: nearest_link(element),
            })
            .collect())
    }
}

#[async_trait]
impl RenderedPage for StaticPage {
    async fn page_source(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn find_all(&self, scope: Option<&str>, selector: &str) -> Result<Vec<PageElement>> {
        self.select(scope, selector)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {}: {:?}", selector, e))
}

fn nearest_link(element: ElementRef<'_>) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "a")
        .and_then(|a_tag| a_tag.value().attr("href"))
        .map(|href| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div id="search">
            <div class="g">
              <a href="https://www.rei.com/learn/expert-advice/running-shoes.html">
                <br><h3>How to Choose Running Shoes</h3>
              </a>
            </div>
            <div role="heading">People also ask</div>
          </div>
          <h3>Outside the results</h3>
        </body></html>
    "#;

    #[tokio::test]
    async fn static_page_resolves_text_and_nearest_link() {
        let page = StaticPage::new(PAGE);
        let elements = page.find_all(None, "div.g h3").await.unwrap();

        assert_eq!(
            elements,
            vec![PageElement {
                text: "How to Choose Running Shoes".to_string(),
                ancestor_href: Some(
                    "https://www.rei.com/learn/expert-advice/running-shoes.html".to_string()
                ),
            }]
        );
    }

    #[tokio::test]
    async fn static_page_scopes_queries_to_the_container() {
        let page = StaticPage::new(PAGE);

        let scoped = page.find_all(Some("div#search"), "h3").await.unwrap();
        let unscoped = page.find_all(None, "h3").await.unwrap();

        assert_eq!(scoped.len(), 1);
        assert_eq!(unscoped.len(), 2);
        assert!(page.find_all(Some("div#rso"), "h3").await.is_err());
    }

    #[tokio::test]
    async fn static_page_reports_invalid_selectors() {
        let page = StaticPage::new(PAGE);
        assert!(page.find_all(None, "h3[").await.is_err());
    }
}
