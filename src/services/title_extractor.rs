use std::collections::HashSet;

use itertools::Itertools;

use crate::{
    configuration::ScraperSettings,
    domain::{domain_from_href, SearchTitle},
};

use super::droid::{PageElement, RenderedPage};

/// Pulls result headings out of a rendered results page.
///
/// Title selectors are tried in order, most specific first. A selector that
/// errors or matches nothing contributes no titles; an empty result is valid.
pub struct TitleExtractor {
    container_selectors: Vec<String>,
    title_selectors: Vec<String>,
    excluded_titles: HashSet<String>,
}

impl TitleExtractor {
    pub fn new(settings: &ScraperSettings) -> Self {
        TitleExtractor {
            container_selectors: settings.result_container_selectors.clone(),
            title_selectors: settings.title_selectors.clone(),
            excluded_titles: settings
                .excluded_titles
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
        }
    }

    pub async fn extract(&self, page: &dyn RenderedPage) -> Vec<SearchTitle> {
        let container = self.find_container(page).await;

        let mut titles = vec![];
        for selector in self.title_selectors.iter() {
            match page.find_all(container, selector).await {
                Ok(elements) => {
                    if !elements.is_empty() {
                        log::info!("Found {} titles with selector: {}", elements.len(), selector);
                    }
                    titles.extend(elements.into_iter().filter_map(|e| self.to_title(e)));
                }
                Err(e) => log::warn!("Error with selector {}: {:#}", selector, e),
            }
        }

        let titles: Vec<SearchTitle> = titles.into_iter().unique().collect();
        log::info!("Found {} unique titles", titles.len());
        titles
    }

    async fn find_container(&self, page: &dyn RenderedPage) -> Option<&str> {
        for selector in self.container_selectors.iter() {
            if let Ok(found) = page.find_all(None, selector).await {
                if !found.is_empty() {
                    log::info!("Found results container with selector: {}", selector);
                    return Some(selector.as_str());
                }
            }
        }

        if !self.container_selectors.is_empty() {
            log::warn!("Could not find a results container, searching the whole page");
        }
        None
    }

    fn to_title(&self, element: PageElement) -> Option<SearchTitle> {
        let text = element.text.split_whitespace().join(" ");
        if text.is_empty() || self.excluded_titles.contains(&text.to_lowercase()) {
            return None;
        }

        let domain = element.ancestor_href.as_deref().and_then(domain_from_href);
        Some(SearchTitle::new(text, domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::droid::StaticPage;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div id="top_nav"><h3>All filters</h3></div>
          <div id="search">
            <div id="rso">
              <div class="g">
                <a href="https://www.runnersworld.com/gear/a20865766/best-running-shoes/">
                  <h3>The Best Running Shoes of 2025,
                      Tested and Reviewed</h3>
                </a>
              </div>
              <div class="g">
                <a href="https://www.nike.com/w/running-shoes-37v7jzy7ok">
                  <h3>Men's Running Shoes. Nike.com</h3>
                </a>
              </div>
              <div><h3>People also ask</h3></div>
              <div role="heading">Shopping results</div>
              <div class="g">
                <a href="https://www.nike.com/w/running-shoes-37v7jzy7ok?page=2">
                  <h3>Men's Running Shoes. Nike.com</h3>
                </a>
              </div>
              <div class="g">
                <a href="https://www.reddit.com/r/RunningShoeGeeks/">
                  <h3>Men's Running Shoes. Nike.com</h3>
                </a>
              </div>
              <div role="heading">Related discussions on trail shoes</div>
              <h3>   </h3>
            </div>
          </div>
        </body></html>
    "#;

    fn extractor() -> TitleExtractor {
        TitleExtractor::new(&ScraperSettings::default())
    }

    #[tokio::test]
    async fn extracts_titles_with_domains_in_selector_order() {
        let titles = extractor().extract(&StaticPage::new(RESULTS_PAGE)).await;

        assert_eq!(
            titles,
            vec![
                SearchTitle::new(
                    "The Best Running Shoes of 2025, Tested and Reviewed",
                    Some("runnersworld.com".to_string())
                ),
                SearchTitle::new("Men's Running Shoes. Nike.com", Some("nike.com".to_string())),
                SearchTitle::new("Men's Running Shoes. Nike.com", Some("reddit.com".to_string())),
                SearchTitle::new("Related discussions on trail shoes", None),
            ]
        );
    }

    #[tokio::test]
    async fn duplicates_collapse_on_text_and_domain() {
        let titles = extractor().extract(&StaticPage::new(RESULTS_PAGE)).await;

        let nike = titles
            .iter()
            .filter(|t| t.source_domain() == Some("nike.com"))
            .count();
        assert_eq!(nike, 1);
    }

    #[tokio::test]
    async fn excluded_labels_never_become_titles() {
        let titles = extractor().extract(&StaticPage::new(RESULTS_PAGE)).await;

        for title in titles.iter() {
            let lowered = title.text().to_lowercase();
            assert_ne!(lowered, "people also ask");
            assert_ne!(lowered, "shopping results");
            assert_ne!(lowered, "all filters");
            assert!(!title.text().is_empty());
        }
    }

    #[tokio::test]
    async fn whole_page_is_searched_without_a_container() {
        let page = StaticPage::new(
            r#"<html><body>
                 <a href="https://www.asics.com/us/en-us/running-shoes/"><h3>Running Shoes | ASICS</h3></a>
               </body></html>"#,
        );

        let titles = extractor().extract(&page).await;

        assert_eq!(
            titles,
            vec![SearchTitle::new("Running Shoes | ASICS", Some("asics.com".to_string()))]
        );
    }

    #[tokio::test]
    async fn broken_selectors_contribute_nothing() {
        let settings = ScraperSettings {
            title_selectors: vec!["h3[".to_string(), "h3".to_string()],
            ..ScraperSettings::default()
        };
        let page = StaticPage::new(r#"<div id="search"><h3>Couch to 5K Plan</h3></div>"#);

        let titles = TitleExtractor::new(&settings).extract(&page).await;

        assert_eq!(titles, vec![SearchTitle::new("Couch to 5K Plan", None)]);
    }

    #[tokio::test]
    async fn challenge_page_yields_no_titles() {
        let page = StaticPage::new(
            "<html><body><form id=\"captcha-form\">Our systems have detected unusual traffic</form></body></html>",
        );
        assert!(extractor().extract(&page).await.is_empty());
    }
}
