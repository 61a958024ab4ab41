use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::future::join_all;

use crate::domain::{AnalysisResult, GenerationOutcome, Provider, SearchTitle};

use super::{
    analyzer::FrequencyAnalyzer,
    title_generator::{build_prompt, GenerationError, TitleGenerator},
};

pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Source of search result titles. Failures are absorbed by the
/// implementation: an unusable source yields an empty list.
#[async_trait]
pub trait TitleAcquirer: Send + Sync {
    async fn acquire(&self, keyword: &str, max_results: usize) -> Vec<SearchTitle>;
}

struct ProviderSlot {
    provider: Provider,
    generator: Option<Arc<dyn TitleGenerator>>,
}

/// Acquisition, analysis and title generation for one keyword at a time.
pub struct Pipeline {
    acquirer: Arc<dyn TitleAcquirer>,
    analyzer: FrequencyAnalyzer,
    max_results: usize,
    providers: Vec<ProviderSlot>,
}

impl Pipeline {
    /// A pipeline with every known provider slot present but unconfigured.
    pub fn new(
        acquirer: Arc<dyn TitleAcquirer>,
        analyzer: FrequencyAnalyzer,
        max_results: usize,
    ) -> Self {
        Pipeline {
            acquirer,
            analyzer,
            max_results,
            providers: Provider::ALL
                .into_iter()
                .map(|provider| ProviderSlot {
                    provider,
                    generator: None,
                })
                .collect(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TitleGenerator>) -> Self {
        let provider = generator.provider();
        match self.providers.iter_mut().find(|s| s.provider == provider) {
            Some(slot) => slot.generator = Some(generator),
            None => self.providers.push(ProviderSlot {
                provider,
                generator: Some(generator),
            }),
        }
        self
    }

    pub fn configured_providers(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .filter(|s| s.generator.is_some())
            .map(|s| s.provider)
            .collect()
    }

    pub async fn run(&self, keyword: &str, temperature: f32, instructions: &str) -> AnalysisResult {
        log::info!("Starting analysis for keyword: {}", keyword);
        let titles = self.acquirer.acquire(keyword, self.max_results).await;

        if titles.is_empty() {
            log::warn!("No titles found to analyze for keyword: {}", keyword);
            return AnalysisResult::no_titles(keyword, self.providers.iter().map(|s| s.provider));
        }

        log::info!("Analyzing {} titles...", titles.len());
        let analysis = self.analyzer.analyze(&titles);

        let temperature = clamp_temperature(temperature);
        let prompt = build_prompt(keyword, &analysis.top_terms, instructions);

        let outcomes = join_all(
            self.providers
                .iter()
                .map(|slot| generate_with(slot, &prompt, temperature)),
        )
        .await;

        AnalysisResult {
            keyword: keyword.to_string(),
            titles_analyzed: titles.len(),
            top_terms: analysis.top_terms,
            term_frequency: analysis.term_frequency,
            analyzed_titles: titles.iter().map(ToString::to_string).collect(),
            generated_titles: outcomes.into_iter().collect::<BTreeMap<_, _>>(),
        }
    }
}

async fn generate_with(
    slot: &ProviderSlot,
    prompt: &str,
    temperature: f32,
) -> (Provider, GenerationOutcome) {
    let Some(generator) = slot.generator.as_ref() else {
        return (
            slot.provider,
            GenerationOutcome::CredentialNotProvided(slot.provider),
        );
    };

    let outcome = match generator.generate(prompt, temperature).await {
        Ok(title) => GenerationOutcome::Generated(title),
        Err(e) if matches!(
            e.downcast_ref::<GenerationError>(),
            Some(GenerationError::EmptyReply)
        ) =>
        {
            log::error!("{} did not generate a title", slot.provider.display_name());
            GenerationOutcome::EmptyReply(slot.provider)
        }
        Err(e) => {
            log::error!(
                "Error generating title with {}: {:#}",
                slot.provider.display_name(),
                e
            );
            GenerationOutcome::Failed(slot.provider)
        }
    };
    (slot.provider, outcome)
}

/// Providers accept `[0.0, 1.0]`; anything that is not a number falls back
/// to the default.
pub fn clamp_temperature(temperature: f32) -> f32 {
    match temperature.is_finite() {
        true => temperature.clamp(0.0, 1.0),
        false => DEFAULT_TEMPERATURE,
    }
}
