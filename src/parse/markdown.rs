// src/parse/markdown.rs
// =============================================================================
// This module turns Markdown text into quads.
//
// We use the `pulldown-cmark` crate which:
// - Parses Markdown into events (heading, paragraph, link, etc.)
// - Follows the CommonMark specification
//
// Every link [text](url) becomes <document> rdfs:seeAlso <url>. Relative
// links are resolved against the document URL, so ./docs/README.md is
// followed too.
// =============================================================================

use anyhow::Result;
use pulldown_cmark::{Event, Parser, Tag};

use super::{parse_base, resolve_url, RDFS_SEE_ALSO};
use crate::rdf::{Quad, Term};

pub fn parse_markdown(markdown: &str, base_url: &str) -> Result<Vec<Quad>> {
    let base = parse_base(base_url)?;
    let document = Term::iri(base.as_str());

    let quads = Parser::new(markdown)
        .filter_map(|event| match event {
            // In pulldown-cmark 0.9, Link is Tag::Link(link_type, dest_url, title)
            Event::Start(Tag::Link(_link_type, dest_url, _title)) => {
                resolve_url(&base, &dest_url)
            }
            _ => None,
        })
        .map(|target| {
            Quad::triple(
                document.clone(),
                Term::iri(RDFS_SEE_ALSO),
                Term::iri(target),
            )
        })
        .collect();

    Ok(quads)
}
