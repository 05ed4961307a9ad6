//! Amnesia Reader CLI
//!
//! Runs a search session against headless renderers and prints the results
//! as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amnesia_reader::config::EngineConfig;
use amnesia_reader::document::{NavigationOutcome, SearchMatch};
use amnesia_reader::epub::EpubSearchSession;
use amnesia_reader::headless::{HeadlessFlowRenderer, HeadlessPageRenderer};
use amnesia_reader::pdf::{PageTextContent, PdfSearchSession};

mod cli;
use cli::{Cli, Commands};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchReport {
    query: String,
    total_matches: usize,
    /// Units whose matches were cut off at the per-unit cap
    capped_units: Vec<usize>,
    /// Units that could not be read and were skipped
    skipped_units: Vec<usize>,
    matches: Vec<SearchMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    navigation: Option<NavigationOutcome>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amnesia_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = EngineConfig::from_env();

    let cli = Cli::parse();
    let report = match cli.command {
        Commands::Pdf {
            text_layer,
            query,
            navigate,
        } => search_pdf(text_layer, query, navigate, config).await?,
        Commands::Epub {
            sections,
            query,
            navigate,
        } => search_epub(sections, query, navigate, config).await?,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn search_pdf(
    text_layer: PathBuf,
    query: String,
    navigate: Option<usize>,
    config: EngineConfig,
) -> Result<SearchReport> {
    let raw = tokio::fs::read(&text_layer)
        .await
        .with_context(|| format!("reading {}", text_layer.display()))?;
    let pages: Vec<PageTextContent> = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing text layer {}", text_layer.display()))?;
    tracing::info!(pages = pages.len(), "Loaded text layer");

    let session = PdfSearchSession::new(Arc::new(HeadlessPageRenderer::new(pages)), config);
    session.warm_cache().await.context("warming page cache")?;

    let total_matches = session.search(&query).await?;
    let navigation = match navigate {
        Some(index) => Some(session.navigate_to_match(index).await?),
        None => None,
    };

    Ok(SearchReport {
        query,
        total_matches,
        capped_units: session.capped_units(),
        skipped_units: session.failed_pages(),
        matches: session.matches(),
        navigation,
    })
}

async fn search_epub(
    paths: Vec<PathBuf>,
    query: String,
    navigate: Option<usize>,
    config: EngineConfig,
) -> Result<SearchReport> {
    let mut sections = Vec::with_capacity(paths.len());
    for path in &paths {
        let markup = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        sections.push(markup);
    }
    tracing::info!(sections = sections.len(), "Loaded sections");

    let session = EpubSearchSession::new(Arc::new(HeadlessFlowRenderer::new(sections)), config);
    let total_matches = session.search(&query).await?;
    let navigation = match navigate {
        Some(index) => Some(session.navigate_to_match(index).await?),
        None => None,
    };

    Ok(SearchReport {
        query,
        total_matches,
        capped_units: session.capped_units(),
        skipped_units: session.failed_sections(),
        matches: session.matches(),
        navigation,
    })
}
