use std::{collections::BTreeMap, fmt};

use serde::{Serialize, Serializer};

use super::provider::Provider;

/// Occurrence count of every qualifying token across one run's titles.
pub type TermFrequencyTable = BTreeMap<String, usize>;

pub const NO_TITLES_FOUND: &str = "No titles found to analyze";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub term_frequency: TermFrequencyTable,
    /// Highest counts first, ties in first-seen order.
    pub top_terms: Vec<String>,
}

impl Analysis {
    pub fn count_of(&self, term: &str) -> usize {
        self.term_frequency.get(term).copied().unwrap_or(0)
    }
}

/// What a provider contributed to a run. Always rendered as a string so the
/// result keeps its shape whatever happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated(String),
    NoTitlesFound,
    CredentialNotProvided(Provider),
    Failed(Provider),
    /// The provider answered but the reply held no title.
    EmptyReply(Provider),
}

impl GenerationOutcome {
    pub fn is_credential_missing(&self) -> bool {
        matches!(self, GenerationOutcome::CredentialNotProvided(_))
    }

    pub fn generated(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Generated(title) => Some(title),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationOutcome::Generated(title) => write!(f, "{}", title),
            GenerationOutcome::NoTitlesFound => write!(f, "{}", NO_TITLES_FOUND),
            GenerationOutcome::CredentialNotProvided(provider) => {
                write!(f, "{}", provider.missing_credential_message())
            }
            GenerationOutcome::Failed(provider) => write!(f, "{}", provider.failure_message()),
            GenerationOutcome::EmptyReply(provider) => {
                write!(f, "{}", provider.empty_reply_message())
            }
        }
    }
}

impl Serialize for GenerationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub keyword: String,
    pub titles_analyzed: usize,
    pub top_terms: Vec<String>,
    pub term_frequency: TermFrequencyTable,
    pub analyzed_titles: Vec<String>,
    pub generated_titles: BTreeMap<Provider, GenerationOutcome>,
}

impl AnalysisResult {
    /// Result for a run where acquisition produced nothing; no provider is consulted.
    pub fn no_titles(keyword: &str, providers: impl IntoIterator<Item = Provider>) -> Self {
        AnalysisResult {
            keyword: keyword.to_string(),
            titles_analyzed: 0,
            top_terms: vec![],
            term_frequency: TermFrequencyTable::new(),
            analyzed_titles: vec![],
            generated_titles: providers
                .into_iter()
                .map(|provider| (provider, GenerationOutcome::NoTitlesFound))
                .collect(),
        }
    }

    pub fn outcome(&self, provider: Provider) -> Option<&GenerationOutcome> {
        self.generated_titles.get(&provider)
    }
}
