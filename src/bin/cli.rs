use std::{fmt::Write as _, sync::Arc};

use anyhow::Context;
use env_logger::Env;
use serptitle::{
    configuration::get_configuration,
    domain::AnalysisResult,
    services::{InstructionStore, StdinConfirmation, DEFAULT_TEMPERATURE},
    startup::build_pipeline,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;
    if !configuration.api_keys.any() {
        anyhow::bail!("Neither OPENAI_API_KEY nor ANTHROPIC_API_KEY found. Please set at least one API key");
    }

    let pipeline = build_pipeline(&configuration, Arc::new(StdinConfirmation))?;
    let instructions = InstructionStore::new(&configuration.instructions).load().await;

    let keyword = read_keyword().await?;
    if keyword.is_empty() {
        anyhow::bail!("No keyword given");
    }

    let result = pipeline
        .run(&keyword, DEFAULT_TEMPERATURE, &instructions)
        .await;
    println!("{}", format_report(&result));

    Ok(())
}

async fn read_keyword() -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Enter the keyword to analyze: ").await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(line.trim().to_string())
}

fn format_report(result: &AnalysisResult) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "\nAnalysis Results");
    let _ = writeln!(report, "Keyword: {}", result.keyword);
    let _ = writeln!(report, "Titles Analyzed: {}", result.titles_analyzed);

    let _ = writeln!(report, "\nTop Terms:");
    for term in result.top_terms.iter() {
        let count = result.term_frequency.get(term).copied().unwrap_or(0);
        let _ = writeln!(report, "- {}: {} occurrences", term, count);
    }

    let _ = writeln!(report, "\nGenerated Titles:");
    for (provider, outcome) in result.generated_titles.iter() {
        if outcome.is_credential_missing() {
            continue;
        }
        let _ = writeln!(report, "{}: {}", provider.display_name(), outcome);
    }

    report
}
