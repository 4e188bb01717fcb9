// src/config.rs
// =============================================================================
// Traversal settings, loadable from a JSON file.
//
// Every field has a default, so a config file only needs the fields it wants
// to change. The CLI loads the file (if any) and then applies its own flags
// on top.
//
// Example file:
//   {
//     "concurrency": 4,
//     "queue": "priority",
//     "max_depth": 3,
//     "exclude_prefixes": ["http://"],
//     "extract": { "predicates": ["http://www.w3.org/2000/01/rdf-schema#seeAlso"] }
//   }
// =============================================================================

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dereference::CONTEXT_LENIENT;
use crate::error::{Result, TraversalError};
use crate::extract::{AllIrisExtractor, CompositeExtractor, HeaderExtractor, PredicateExtractor};
use crate::link::{Link, QueryContext};
use crate::queue::{
    CountLimitQueue, DepthLimitQueue, FifoQueue, FilterQueue, LinkFilter, LinkQueue, PriorityQueue,
};
use crate::traversal::DEFAULT_CONCURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Breadth-first, in discovery order
    #[default]
    Fifo,
    /// Highest link priority first
    Priority,
}

/// Which links to follow out of a document's quads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Every subject, object and graph IRI
    #[default]
    All,
    /// Only objects of these predicates
    Predicates(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub concurrency: usize,
    pub queue: QueueKind,
    pub max_depth: Option<usize>,
    pub max_links: Option<usize>,
    /// Links whose URL starts with one of these are never dereferenced
    pub exclude_prefixes: Vec<String>,
    pub cardinality_updates: bool,
    pub extract: ExtractMode,
    /// `rel` values of HTTP Link headers to follow
    pub link_rels: Vec<String>,
    pub timeout_secs: u64,
    /// Turn unparseable or failed responses into empty documents
    pub lenient: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        TraversalConfig {
            concurrency: DEFAULT_CONCURRENCY,
            queue: QueueKind::Fifo,
            max_depth: None,
            max_links: None,
            exclude_prefixes: Vec::new(),
            cardinality_updates: false,
            extract: ExtractMode::All,
            link_rels: vec!["describedby".to_string()],
            timeout_secs: 10,
            lenient: false,
        }
    }
}

impl TraversalConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TraversalConfig = serde_json::from_str(json)
            .map_err(|e| TraversalError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TraversalError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(TraversalError::Config(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(TraversalError::Config(
                "timeout_secs must be at least 1".into(),
            ));
        }
        if let ExtractMode::Predicates(predicates) = &self.extract {
            if predicates.is_empty() {
                return Err(TraversalError::Config(
                    "extract.predicates needs at least one predicate".into(),
                ));
            }
        }
        Ok(())
    }

    /// Builds the link queue: the base queue wrapped in a count limit, then a
    /// depth limit, then the exclusion filters (outermost).
    pub fn build_queue(&self) -> Box<dyn LinkQueue> {
        // 1. The discipline: first in first out, or highest priority first
        let mut queue: Box<dyn LinkQueue> = match self.queue {
            QueueKind::Fifo => Box::new(FifoQueue::new()),
            QueueKind::Priority => Box::new(PriorityQueue::new()),
        };
        // 2. Limits, innermost first, so depth-refused links never use up the
        //    count budget
        if let Some(max_links) = self.max_links {
            queue = Box::new(CountLimitQueue::new(queue, max_links));
        }
        if let Some(max_depth) = self.max_depth {
            queue = Box::new(DepthLimitQueue::new(queue, max_depth));
        }
        // 3. Exclusions go outside everything else
        if !self.exclude_prefixes.is_empty() {
            let filters = self
                .exclude_prefixes
                .iter()
                .map(|prefix| {
                    let prefix = prefix.clone();
                    Box::new(move |link: &Link| !link.url.starts_with(&prefix)) as LinkFilter
                })
                .collect();
            queue = Box::new(FilterQueue::new(queue, filters));
        }
        queue
    }

    pub fn build_extractor(&self) -> CompositeExtractor {
        let extractor = match &self.extract {
            ExtractMode::All => CompositeExtractor::new().with(AllIrisExtractor),
            ExtractMode::Predicates(predicates) => {
                CompositeExtractor::new().with(PredicateExtractor::new(predicates.clone(), false))
            }
        };
        if self.link_rels.is_empty() {
            extractor
        } else {
            extractor.with(HeaderExtractor::new(self.link_rels.clone()))
        }
    }

    // The ambient context every dereference starts from
    pub fn context(&self) -> QueryContext {
        let context = QueryContext::new();
        if self.lenient {
            context.with(CONTEXT_LENIENT, true)
        } else {
            context
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
