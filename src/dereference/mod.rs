// src/dereference/mod.rs
// =============================================================================
// This module turns a link into a document.
//
// Dereferencing = fetching the URL + parsing the response into quads. The
// traversal manager only knows the Dereferencer trait, so tests can plug in
// an in-memory implementation and the CLI plugs in the HTTP one.
//
// Submodules:
// - http: reqwest-based dereferencer with content negotiation
// =============================================================================

mod http;

pub use http::HttpDereferencer;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::link::{Link, QueryContext};
use crate::rdf::Quad;
use crate::source::QuerySource;

// Context key: when true, unparseable documents become empty instead of failing
pub const CONTEXT_LENIENT: &str = "lenient";

/// A fetched and parsed document.
pub struct Document {
    /// Final URL after redirects
    pub url: String,
    pub quads: BoxStream<'static, Quad>,
    /// Response headers, lower-cased names, repeated headers joined with ", "
    pub headers: BTreeMap<String, String>,
    /// Set when the document can answer queries itself and should be queried
    /// as a separate source instead of being merged into the aggregate
    pub source: Option<Arc<dyn QuerySource>>,
}

impl Document {
    pub fn new(url: impl Into<String>, quads: Vec<Quad>, headers: BTreeMap<String, String>) -> Self {
        Document {
            url: url.into(),
            quads: stream::iter(quads).boxed(),
            headers,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn QuerySource>) -> Self {
        self.source = Some(source);
        self
    }
}

#[async_trait]
pub trait Dereferencer: Send + Sync {
    /// Fetches and parses `link`. An error here is fatal to the traversal.
    async fn dereference(&self, link: &Link, context: &QueryContext) -> Result<Document>;
}

pub fn is_lenient(context: &QueryContext) -> bool {
    context
        .get(CONTEXT_LENIENT)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_streams_its_quads() {
        use crate::rdf::Term;

        let quad = Quad::triple(Term::iri("s:a"), Term::iri("p:b"), Term::iri("o:c"));
        let document = Document::new("https://a/", vec![quad.clone()], BTreeMap::new());
        assert!(document.source.is_none());

        let quads: Vec<_> = document.quads.collect().await;
        assert_eq!(quads, vec![quad]);
    }

    #[test]
    fn test_lenient_flag() {
        assert!(!is_lenient(&QueryContext::new()));
        assert!(is_lenient(&QueryContext::new().with(CONTEXT_LENIENT, true)));
    }
}
