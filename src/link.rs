// src/link.rs
// =============================================================================
// This module defines the unit of work for traversal: a Link.
//
// A link is:
// - A URL to dereference
// - Metadata the queue disciplines care about (priority, depth, extras)
// - An optional context override used only when fetching this link
// - An optional transform applied to the records fetched from this link
//
// Links move from the extractor, into the queue, out to the manager and
// finally into the dereferencer. Decorators stamp metadata (e.g. depth) into
// the link while it passes through them.
// =============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rdf::Quad;

// Rewrites the record stream fetched for a link before it reaches the store
pub type StreamTransform =
    Arc<dyn Fn(BoxStream<'static, Quad>) -> BoxStream<'static, Quad> + Send + Sync>;

/// Metadata carried by a link while it waits in a queue.
///
/// `priority` is read by the priority discipline and `depth` is written by
/// the depth-limit decorator. Anything else lives in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone)]
pub struct Link {
    pub url: String,
    pub metadata: LinkMetadata,
    /// Replaces or augments the ambient context for this fetch only
    pub context: Option<QueryContext>,
    pub transform: Option<StreamTransform>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Link {
            url: url.into(),
            metadata: LinkMetadata::default(),
            context: None,
            transform: None,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.metadata.priority = Some(priority);
        self
    }

    pub fn with_context(mut self, context: QueryContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_transform(mut self, transform: StreamTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    // Depth of this link, with an unset depth counting as 0
    pub fn depth(&self) -> usize {
        self.metadata.depth.unwrap_or(0)
    }
}

// Manual Debug because the transform closure can't be printed
impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("url", &self.url)
            .field("metadata", &self.metadata)
            .field("context", &self.context)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Immutable key/value configuration threaded through every fetch.
///
/// Cloning is cheap: the entries sit behind an `Arc`. "Changing" a context
/// always produces a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    entries: Arc<BTreeMap<String, Value>>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Returns a new context with one extra (or replaced) entry
    pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.into(), value.into());
        QueryContext {
            entries: Arc::new(entries),
        }
    }

    // Returns a new context where entries of `overrides` win over ours
    pub fn merged(&self, overrides: &QueryContext) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        for (key, value) in overrides.entries.iter() {
            entries.insert(key.clone(), value.clone());
        }
        QueryContext {
            entries: Arc::new(entries),
        }
    }

    // The context to use when fetching `link`
    pub fn for_link(&self, link: &Link) -> Self {
        match &link.context {
            Some(overrides) => self.merged(overrides),
            None => self.clone(),
        }
    }
}
