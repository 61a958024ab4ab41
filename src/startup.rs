use std::{net::TcpListener, sync::Arc};

use actix_files::Files;
use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::{
    configuration::Settings,
    routes::{analyze_route, challenge_route, default_route, instructions_route},
    services::{
        AnthropicClient, ChallengeHandler, Droid, FrequencyAnalyzer, GoogleScraper,
        InstructionStore, OpenaiClient, OperatorSignal, Pipeline, ResolutionSignal,
    },
};

/// Wires the browser, scraper, analyzer and every provider with a credential.
pub fn build_pipeline(
    settings: &Settings,
    signal: Arc<dyn ResolutionSignal>,
) -> anyhow::Result<Pipeline> {
    let browser = Arc::new(Droid::new(settings.browser.clone()));
    let challenge = ChallengeHandler::new(&settings.challenge, signal);
    let scraper = GoogleScraper::new(
        browser,
        settings.browser.headless,
        &settings.scraper,
        challenge,
    );

    let mut pipeline = Pipeline::new(
        Arc::new(scraper),
        FrequencyAnalyzer::new(&settings.analysis),
        settings.scraper.max_results,
    );

    if let Some(key) = settings.api_keys.openai() {
        pipeline = pipeline.with_generator(Arc::new(OpenaiClient::new(key.to_string())));
    }
    if let Some(key) = settings.api_keys.anthropic() {
        pipeline = pipeline.with_generator(Arc::new(AnthropicClient::new(key.to_string())?));
    }

    for provider in pipeline.configured_providers() {
        log::info!("Title provider available: {}", provider.display_name());
    }

    Ok(pipeline)
}

pub fn run(
    listener: TcpListener,
    pipeline: Pipeline,
    instruction_store: InstructionStore,
    operator_signal: Arc<OperatorSignal>,
) -> Result<Server, std::io::Error> {
    let pipeline = web::Data::new(pipeline);
    let instruction_store = web::Data::new(instruction_store);
    let operator_signal = web::Data::from(operator_signal);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(Files::new("/static", "./templates/static").prefer_utf8(true))
            .service(default_route::index)
            .service(analyze_route::analyze)
            .service(instructions_route::reset_instructions)
            .service(challenge_route::resolve_challenge)
            .app_data(pipeline.clone())
            .app_data(instruction_store.clone())
            .app_data(operator_signal.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
