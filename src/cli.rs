// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// One subcommand for now:
//   link-traversal crawl <seeds...> [options]
//
// Flags override whatever a --config file sets; anything set in neither
// place keeps its default from TraversalConfig.
// =============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use link_traversal::config::{QueueKind, TraversalConfig};
use link_traversal::{QuadPattern, Term};

#[derive(Parser, Debug)]
#[command(
    name = "link-traversal",
    version,
    about = "Follow links between linked-data documents and query everything they say",
    long_about = "link-traversal starts from one or more seed documents, follows the links \
                  it finds in them, and streams every quad matching a pattern while the \
                  crawl is still running."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Traverse from seed URLs and print matching quads
    ///
    /// Example: link-traversal crawl https://example.org/profile --max-depth 2
    Crawl(CrawlArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Seed URLs to start from
    #[arg(required = true)]
    pub seeds: Vec<String>,

    /// Maximum number of documents fetched at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum link depth (seeds are depth 1)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum number of links ever queued
    #[arg(long)]
    pub max_links: Option<usize>,

    /// Use a priority queue instead of breadth-first order
    #[arg(long)]
    pub priority: bool,

    /// Never follow URLs starting with this prefix (repeatable)
    #[arg(long = "exclude", value_name = "PREFIX")]
    pub exclude: Vec<String>,

    /// Only print quads with this subject IRI
    #[arg(long)]
    pub subject: Option<String>,

    /// Only print quads with this predicate IRI
    #[arg(long)]
    pub predicate: Option<String>,

    /// Only print quads with this object IRI
    #[arg(long)]
    pub object: Option<String>,

    /// Treat failed or unparseable responses as empty documents
    #[arg(long)]
    pub lenient: bool,

    /// Output quads and summary as JSON instead of N-Quads
    #[arg(long)]
    pub json: bool,

    /// JSON config file with traversal settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CrawlArgs {
    // Flags win over the config file
    pub fn apply(&self, config: &mut TraversalConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if self.max_depth.is_some() {
            config.max_depth = self.max_depth;
        }
        if self.max_links.is_some() {
            config.max_links = self.max_links;
        }
        if self.priority {
            config.queue = QueueKind::Priority;
        }
        if self.lenient {
            config.lenient = true;
        }
        config.exclude_prefixes.extend(self.exclude.iter().cloned());
    }

    pub fn pattern(&self) -> QuadPattern {
        QuadPattern::new(
            self.subject.as_deref().map(Term::iri),
            self.predicate.as_deref().map(Term::iri),
            self.object.as_deref().map(Term::iri),
            None,
        )
    }
}
