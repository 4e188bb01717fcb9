// src/traversal/discovery.rs
// =============================================================================
// Telemetry for link discovery.
//
// A DiscoverySink is told about every link an extractor finds, together with
// the document it was found in. It only observes: nothing it does changes
// what gets traversed.
// =============================================================================

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::link::Link;

pub trait DiscoverySink: Send + Sync {
    fn link_discovered(&self, link: &Link, parent: &Link);
}

/// One "parent links to child" observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryEdge {
    pub parent: String,
    pub child: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_depth: Option<usize>,
}

/// Keeps every discovery edge in memory, e.g. to dump the link graph as JSON.
#[derive(Debug, Default)]
pub struct DiscoveryRecorder {
    edges: Mutex<Vec<DiscoveryEdge>>,
}

impl DiscoveryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edges(&self) -> Vec<DiscoveryEdge> {
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.edges.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiscoverySink for DiscoveryRecorder {
    fn link_discovered(&self, link: &Link, parent: &Link) {
        tracing::trace!(parent = %parent.url, child = %link.url, "Link discovered");
        self.edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(DiscoveryEdge {
                parent: parent.url.clone(),
                child: link.url.clone(),
                parent_depth: parent.metadata.depth,
            });
    }
}
