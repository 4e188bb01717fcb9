// src/extract/mod.rs
// =============================================================================
// This module decides which links inside a fetched document get followed.
//
// Extractors:
// - AllIrisExtractor: every IRI in subject, object or graph position
// - PredicateExtractor: objects of chosen predicates (rdfs:seeAlso, ...)
// - HeaderExtractor: HTTP `Link` headers with chosen rel values
// - CompositeExtractor: runs several extractors and merges their links
//
// Extraction never ends a traversal. An extractor that fails only costs the
// links it would have produced; the document's quads are still imported.
// =============================================================================

mod headers;
mod quads;

pub use headers::HeaderExtractor;
pub use quads::{AllIrisExtractor, PredicateExtractor};

use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use url::Url;

use crate::link::{Link, QueryContext};
use crate::rdf::Quad;

/// What an extractor gets to look at: the fetched document's quads and
/// response headers.
pub struct ExtractInput<'a> {
    pub url: &'a str,
    pub quads: &'a [Quad],
    pub headers: &'a BTreeMap<String, String>,
    pub context: &'a QueryContext,
}

pub trait LinkExtractor: Send + Sync {
    fn extract(&self, input: &ExtractInput<'_>) -> Result<Vec<Link>>;
}

/// Runs every inner extractor. Links are de-duplicated by URL, first one wins.
#[derive(Default)]
pub struct CompositeExtractor {
    extractors: Vec<Box<dyn LinkExtractor>>,
}

impl CompositeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: impl LinkExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl LinkExtractor for CompositeExtractor {
    fn extract(&self, input: &ExtractInput<'_>) -> Result<Vec<Link>> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for extractor in &self.extractors {
            match extractor.extract(input) {
                Ok(found) => {
                    for link in found {
                        if seen.insert(link.url.clone()) {
                            links.push(link);
                        }
                    }
                }
                // one failing extractor shouldn't hide the others' links
                Err(e) => {
                    tracing::warn!(url = %input.url, error = %e, "Link extractor failed");
                }
            }
        }

        Ok(links)
    }
}

// Turns an IRI into a traversable URL: http(s) only, fragment removed
pub fn normalize_link_url(iri: &str) -> Option<String> {
    let mut url = Url::parse(iri).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Fixed(Vec<&'static str>);

    impl LinkExtractor for Fixed {
        fn extract(&self, _input: &ExtractInput<'_>) -> Result<Vec<Link>> {
            Ok(self.0.iter().map(|url| Link::new(*url)).collect())
        }
    }

    struct Broken;

    impl LinkExtractor for Broken {
        fn extract(&self, _input: &ExtractInput<'_>) -> Result<Vec<Link>> {
            Err(anyhow!("boom"))
        }
    }

    #[test]
    fn test_composite_merges_and_survives_failures() {
        let headers = BTreeMap::new();
        let context = QueryContext::new();
        let input = ExtractInput {
            url: "https://a/",
            quads: &[],
            headers: &headers,
            context: &context,
        };

        let extractor = CompositeExtractor::new()
            .with(Fixed(vec!["https://a/1", "https://a/2"]))
            .with(Broken)
            .with(Fixed(vec!["https://a/2", "https://a/3"]));
        assert_eq!(extractor.len(), 3);

        let urls: Vec<_> = extractor
            .extract(&input)
            .unwrap()
            .into_iter()
            .map(|l| l.url)
            .collect();
        assert_eq!(urls, vec!["https://a/1", "https://a/2", "https://a/3"]);
    }

    #[test]
    fn test_normalize_strips_fragment_and_non_http() {
        assert_eq!(
            normalize_link_url("https://example.org/card#me"),
            Some("https://example.org/card".to_string())
        );
        assert_eq!(normalize_link_url("urn:isbn:123"), None);
        assert_eq!(normalize_link_url("not a url"), None);
    }
}
