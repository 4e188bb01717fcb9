// src/lib.rs
// =============================================================================
// Link traversal: follow links from a few seed documents, collect everything
// they say into one queryable store, and answer queries while the crawl is
// still running.
//
// Modules:
// - link:        Link, its metadata and the per-query context
// - rdf:         quads, terms and quad patterns
// - queue:       link queues (FIFO, priority) and limiting decorators
// - store:       the aggregated store and its live cursors
// - source:      the query-source protocol and the traversal adapter
// - traversal:   the manager that drives the crawl
// - dereference: fetching and parsing documents
// - parse:       HTML, Markdown and N-Quads parsers
// - extract:     finding follow-up links in documents
// - config:      traversal settings
// - error:       library error type
// =============================================================================

pub mod config;
pub mod dereference;
pub mod error;
pub mod extract;
pub mod link;
pub mod parse;
pub mod queue;
pub mod rdf;
pub mod source;
pub mod store;
pub mod traversal;

pub use config::TraversalConfig;
pub use error::{Result, TraversalError};
pub use link::{Link, LinkMetadata, QueryContext, StreamTransform};
pub use rdf::{Quad, QuadPattern, Term};
pub use source::{QuadCursor, QuerySource, StaticSource, TraversalSource, UnionCursor};
pub use store::{AggregatedStore, Cardinality, Cursor, MetadataHandle};
pub use traversal::{TraversalManager, TraversalManagerBuilder};
