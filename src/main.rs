// Copyright (c) 2025 Derma Labs
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use derma_analysis_node::{
    AnalysisPipeline, AnalysisRequest, AnalysisStore, InMemoryStore, Locale, ModeHint,
    ModelRuntime, PipelineConfig, ProviderCredentials, ProviderRegistry,
};
use std::{env, path::PathBuf, sync::Arc};
use tracing::info;

/// One-shot skin analysis of an image file.
#[derive(Parser, Debug)]
#[command(name = "derma-analysis-node", version, about)]
struct Cli {
    /// Path to the image to analyze (PNG, JPEG, WebP or GIF)
    image: PathBuf,

    /// Analysis mode: auto, cv, ai or hybrid
    #[arg(long, default_value = "auto")]
    mode: String,

    /// Output locale for provider prompts: en or th
    #[arg(long, default_value = "en", env = "ANALYSIS_LOCALE")]
    locale: String,

    /// Caller identifier recorded with the persisted result
    #[arg(long, default_value = "cli")]
    caller_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    let credentials = ProviderCredentials::from_env();

    let runtime = Arc::new(ModelRuntime::with_default_specs(config.model_dir.clone()));
    let registry = Arc::new(
        ProviderRegistry::from_credentials(&credentials, &config)
            .context("building provider registry")?,
    );
    let pipeline = AnalysisPipeline::new(runtime, registry, config);

    let image = std::fs::read(&cli.image)
        .with_context(|| format!("reading image {}", cli.image.display()))?;
    let locale = match cli.locale.as_str() {
        "th" => Locale::Th,
        _ => Locale::En,
    };
    let request = AnalysisRequest::new(image)
        .with_mode(ModeHint::parse(&cli.mode))
        .with_locale(locale);

    let result = pipeline.analyze(request).await?;

    let store = InMemoryStore::new();
    let record_id = store.save(&cli.caller_id, &result).await?;
    info!(record_id = %record_id, "result persisted");

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
