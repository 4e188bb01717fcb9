// src/extract/quads.rs
// =============================================================================
// Extractors that read links out of a document's quads.
// =============================================================================

use std::collections::HashSet;

use anyhow::Result;

use super::{normalize_link_url, ExtractInput, LinkExtractor};
use crate::link::Link;
use crate::parse::RDFS_SEE_ALSO;
use crate::rdf::Term;

// Collects unique, normalized URLs in first-seen order
fn links_from<'a>(iris: impl Iterator<Item = &'a str>) -> Vec<Link> {
    let mut seen = HashSet::new();
    iris.filter_map(normalize_link_url)
        .filter(|url| seen.insert(url.clone()))
        .map(Link::new)
        .collect()
}

/// Follows every IRI that appears as subject, object or graph.
///
/// Predicates are vocabulary terms, so they are skipped.
#[derive(Debug, Default, Clone)]
pub struct AllIrisExtractor;

impl LinkExtractor for AllIrisExtractor {
    fn extract(&self, input: &ExtractInput<'_>) -> Result<Vec<Link>> {
        let iris = input
            .quads
            .iter()
            .flat_map(|quad| [&quad.subject, &quad.object, &quad.graph])
            .filter_map(Term::as_iri);
        Ok(links_from(iris))
    }
}

/// Follows the objects of a fixed set of predicates.
///
/// With `check_subject`, only statements about the document itself count,
/// i.e. the subject must be the document URL.
#[derive(Debug, Clone)]
pub struct PredicateExtractor {
    predicates: HashSet<String>,
    check_subject: bool,
}

impl PredicateExtractor {
    pub fn new<I, S>(predicates: I, check_subject: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PredicateExtractor {
            predicates: predicates.into_iter().map(Into::into).collect(),
            check_subject,
        }
    }
}

impl Default for PredicateExtractor {
    fn default() -> Self {
        PredicateExtractor::new([RDFS_SEE_ALSO], false)
    }
}

impl LinkExtractor for PredicateExtractor {
    fn extract(&self, input: &ExtractInput<'_>) -> Result<Vec<Link>> {
        let document = normalize_link_url(input.url);
        let iris = input
            .quads
            .iter()
            .filter(|quad| {
                quad.predicate
                    .as_iri()
                    .is_some_and(|p| self.predicates.contains(p))
            })
            .filter(|quad| {
                !self.check_subject
                    || quad.subject.as_iri().and_then(normalize_link_url) == document
            })
            .filter_map(|quad| quad.object.as_iri());
        Ok(links_from(iris))
    }
}
