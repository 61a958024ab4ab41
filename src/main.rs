use std::{net::TcpListener, sync::Arc};

use env_logger::Env;
use serptitle::{
    configuration::get_configuration,
    services::{InstructionStore, OperatorSignal},
    startup::{build_pipeline, run},
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    log::info!(
        "OpenAI API key present: {} | Anthropic API key present: {}",
        configuration.api_keys.openai().is_some(),
        configuration.api_keys.anthropic().is_some()
    );
    if !configuration.api_keys.any() {
        log::error!("Neither OPENAI_API_KEY nor ANTHROPIC_API_KEY found. Please set at least one API key");
        std::process::exit(1);
    }

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;

    let operator_signal = Arc::new(OperatorSignal::new());
    let pipeline = build_pipeline(&configuration, operator_signal.clone())
        .map_err(std::io::Error::other)?;
    let instruction_store = InstructionStore::new(&configuration.instructions);

    run(listener, pipeline, instruction_store, operator_signal)?.await
}
