use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::Datelike;
use itertools::Itertools;
use regex::Regex;

use crate::{
    configuration::AnalysisSettings,
    domain::{Analysis, SearchTitle, TermFrequencyTable},
};

pub const TOP_TERMS_LIMIT: usize = 10;
const MIN_TERM_LEN: usize = 3;

/// Word runs (hyphenated compounds kept whole), clitics such as `'s`, and
/// single punctuation marks.
const WORD_PATTERN: &str = r"\w+(?:-\w+)*|'\w+|[^\w\s]";

const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

enum Tokenizer {
    Words(Regex),
    Whitespace,
}

impl Tokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            Tokenizer::Words(pattern) => pattern.find_iter(text).map(|m| m.as_str()).collect(),
            Tokenizer::Whitespace => text.split_whitespace().collect(),
        }
    }
}

/// Turns result titles into a term frequency table and a ranked term list.
pub struct FrequencyAnalyzer {
    stop_words: HashSet<String>,
    tokenizer: Tokenizer,
}

impl FrequencyAnalyzer {
    pub fn new(settings: &AnalysisSettings) -> Self {
        Self::with_reference_year(settings, chrono::Utc::now().year())
    }

    /// Builds the analyzer treating `year` and the years before it as stop words.
    pub fn with_reference_year(settings: &AnalysisSettings, year: i32) -> Self {
        let stop_words = ENGLISH_STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(settings.custom_stop_words.iter().map(|w| w.to_lowercase()))
            .chain((0..settings.recent_years as i32).map(|back| (year - back).to_string()))
            .collect();

        let tokenizer = match settings.word_tokenizer {
            true => match Regex::new(WORD_PATTERN) {
                Ok(pattern) => Tokenizer::Words(pattern),
                Err(e) => {
                    log::warn!("Word tokenizer unavailable, falling back to basic splitting: {}", e);
                    Tokenizer::Whitespace
                }
            },
            false => Tokenizer::Whitespace,
        };

        FrequencyAnalyzer {
            stop_words,
            tokenizer,
        }
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Never fails: an internal error is logged and yields an empty analysis.
    pub fn analyze(&self, titles: &[SearchTitle]) -> Analysis {
        match self.try_analyze(titles) {
            Ok(analysis) => analysis,
            Err(e) => {
                log::error!("Error analyzing titles: {:#}", e);
                Analysis::default()
            }
        }
    }

    fn try_analyze(&self, titles: &[SearchTitle]) -> Result<Analysis> {
        let all_text = titles.iter().map(SearchTitle::text).join(" ").to_lowercase();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = vec![];
        for token in self.tokenizer.tokenize(&all_text) {
            if !self.qualifies(token) {
                continue;
            }
            let count = counts.entry(token).or_insert_with(|| {
                first_seen.push(token);
                0
            });
            *count = count.checked_add(1).context("term count overflow")?;
        }

        let mut ranked: Vec<(&str, usize)> = Vec::with_capacity(first_seen.len());
        for term in first_seen {
            let count = counts.get(term).copied().context("term was never counted")?;
            ranked.push((term, count));
        }
        // Stable sort keeps first-seen order among equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let top_terms = ranked
            .iter()
            .take(TOP_TERMS_LIMIT)
            .map(|(term, _)| term.to_string())
            .collect();
        let term_frequency: TermFrequencyTable = ranked
            .into_iter()
            .map(|(term, count)| (term.to_string(), count))
            .collect();

        Ok(Analysis {
            term_frequency,
            top_terms,
        })
    }

    fn qualifies(&self, token: &str) -> bool {
        !self.is_stop_word(token)
            && token.chars().all(char::is_alphanumeric)
            && token.chars().count() >= MIN_TERM_LEN
    }
}
