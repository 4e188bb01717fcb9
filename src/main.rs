// src/main.rs
// =============================================================================
// Entry point of the link-traversal CLI.
//
// What happens here:
// 1. Set up logging (RUST_LOG, logs go to stderr)
// 2. Parse command-line arguments using clap
// 3. Build the traversal from config file + flags
// 4. Stream matching quads to stdout while the crawl runs
// 5. Exit with proper code (0 = completed, 1 = a fetch failed, 2 = bad usage
//    or configuration)
// =============================================================================

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, CrawlArgs};
use link_traversal::dereference::HttpDereferencer;
use link_traversal::traversal::DiscoveryRecorder;
use link_traversal::{Link, Quad, TraversalConfig, TraversalManager, TraversalSource};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,link_traversal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => handle_crawl(&args).await,
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    seeds: usize,
    sources: usize,
    links_discovered: usize,
    quads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn handle_crawl(args: &CrawlArgs) -> Result<i32> {
    // Step 1: Config file (or defaults), then command-line overrides
    let mut config = match &args.config {
        Some(path) => TraversalConfig::from_file(path)?,
        None => TraversalConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    // Step 2: Wire up the manager
    let dereferencer = HttpDereferencer::new(config.timeout())?;
    let recorder = Arc::new(DiscoveryRecorder::new());
    let manager = TraversalManager::builder()
        .seeds(args.seeds.iter().map(Link::new))
        .queue(config.build_queue())
        .store(link_traversal::AggregatedStore::new(config.cardinality_updates))
        .dereferencer(Arc::new(dereferencer))
        .extractor(Arc::new(config.build_extractor()))
        .discovery(recorder.clone())
        .concurrency(config.concurrency)
        .build()
        .context("Failed to set up traversal")?;

    // Step 3: The first query starts the crawl; print quads as they arrive
    let source = TraversalSource::new(manager.clone(), config.context());
    let mut results = source.query(&args.pattern());

    let mut quads: Vec<Quad> = Vec::new();
    let mut failure = None;
    while let Some(result) = results.next().await {
        match result {
            Ok(quad) => {
                if !args.json {
                    println!("{}", quad);
                }
                quads.push(quad);
            }
            Err(e) => failure = Some(e),
        }
    }
    manager.wait().await;

    // Step 4: Summary, as JSON or on stderr
    let summary = Summary {
        seeds: args.seeds.len(),
        sources: manager.store().contained_sources().len(),
        links_discovered: recorder.len(),
        quads: quads.len(),
        error: failure.as_ref().map(ToString::to_string),
    };

    if args.json {
        let output = serde_json::json!({ "quads": quads, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!();
        eprintln!("Summary:");
        eprintln!("   Sources: {}", summary.sources);
        eprintln!("   Links discovered: {}", summary.links_discovered);
        eprintln!("   Quads: {}", summary.quads);
        if let Some(error) = &summary.error {
            eprintln!("   Failed: {}", error);
        }
    }

    Ok(if failure.is_some() { 1 } else { 0 })
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why do logs go to stderr?
//    - stdout carries the N-Quads (or the JSON document)
//    - Piping the output into another tool must not pick up log lines
//
// 2. Why is the summary printed after wait()?
//    - The result stream can end before the driver task has wound down
//    - wait() makes sure the counts are final
//
// 3. Exit codes
//    - 0: the crawl finished
//    - 1: a fetch failed and the crawl was rejected
//    - 2: bad arguments or configuration (anyhow error from run())
// -----------------------------------------------------------------------------
