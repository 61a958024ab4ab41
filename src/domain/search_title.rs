use std::fmt;

use serde::Serialize;
use url::Url;

/// A result heading, annotated with the domain of the link wrapping it when
/// one could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchTitle {
    text: String,
    source_domain: Option<String>,
}

impl SearchTitle {
    pub fn new(text: impl Into<String>, source_domain: Option<String>) -> Self {
        SearchTitle {
            text: text.into(),
            source_domain,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_domain(&self) -> Option<&str> {
        self.source_domain.as_deref()
    }
}

impl fmt::Display for SearchTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_domain {
            Some(domain) => write!(f, "{} ({})", self.text, domain),
            None => write!(f, "{}", self.text),
        }
    }
}

/// Host of an absolute link with a leading `www.` label removed.
pub fn domain_from_href(href: &str) -> Option<String> {
    let parsed_url = Url::parse(href).ok()?;
    match parsed_url.host_str() {
        Some("") | None => None,
        Some(any_host) => match any_host.strip_prefix("www.") {
            Some(h) if !h.is_empty() => Some(h.to_lowercase()),
            Some(_) => None,
            None => Some(any_host.to_lowercase()),
        },
    }
}
