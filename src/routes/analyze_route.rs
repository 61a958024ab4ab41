use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    domain::AnalysisResult,
    services::{InstructionStore, Pipeline, DEFAULT_TEMPERATURE},
};

#[derive(Deserialize)]
pub struct AnalyzeForm {
    #[serde(default)]
    keyword: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default)]
    instructions: String,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

#[post("/analyze")]
pub async fn analyze(
    pipeline: web::Data<Pipeline>,
    instruction_store: web::Data<InstructionStore>,
    body: web::Form<AnalyzeForm>,
) -> HttpResponse {
    log::info!(
        "New analysis request | keyword: {}, temperature: {}",
        body.keyword,
        body.temperature
    );

    if let Err(e) = instruction_store.save_if_changed(&body.instructions).await {
        log::error!("Failed to save instructions: {:#}", e);
    }

    let result = pipeline
        .run(&body.keyword, body.temperature, &body.instructions)
        .await;

    HttpResponse::Ok().json(analysis_response(&result))
}

/// The result as the front end expects it: one field per provider, leaving
/// out providers that have no credential.
fn analysis_response(result: &AnalysisResult) -> Value {
    let mut response = json!({
        "keyword": result.keyword,
        "num_titles_analyzed": result.titles_analyzed,
        "top_terms": result.top_terms,
        "term_frequency": result.term_frequency,
        "analyzed_titles": result.analyzed_titles,
    });

    for (provider, outcome) in result.generated_titles.iter() {
        if outcome.is_credential_missing() {
            continue;
        }
        response[provider.response_key()] = Value::String(outcome.to_string());
    }

    response
}
