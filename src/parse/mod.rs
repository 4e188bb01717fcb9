// src/parse/mod.rs
// =============================================================================
// This module turns fetched documents into quads.
//
// Submodules:
// - ntriples: N-Triples / N-Quads, one statement per line
// - html: <a href> and <link rel href> elements, plus the page title
// - markdown: [text](url) links
//
// HTML and Markdown don't carry RDF themselves, so their links are described
// with a small fixed vocabulary (see the constants below), with the page URL
// as subject. That is enough for the link extractors to find follow-up links.
// =============================================================================

mod html;
mod markdown;
mod ntriples;

pub use html::parse_html;
pub use markdown::parse_markdown;
pub use ntriples::parse_nquads;

use anyhow::{bail, Result};
use url::Url;

use crate::rdf::Quad;

pub const RDFS_SEE_ALSO: &str = "http://www.w3.org/2000/01/rdf-schema#seeAlso";
pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
// <link rel="x"> becomes xhv:x, the way RDFa reads rel values
pub const XHV: &str = "http://www.w3.org/1999/xhtml/vocab#";

/// Content types we know how to turn into quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    NQuads,
    NTriples,
    Html,
    Markdown,
}

impl MediaType {
    // Reads a Content-Type header value, ignoring parameters like charset
    pub fn from_content_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/n-quads" => Some(MediaType::NQuads),
            "application/n-triples" => Some(MediaType::NTriples),
            "text/html" | "application/xhtml+xml" => Some(MediaType::Html),
            "text/markdown" | "text/x-markdown" => Some(MediaType::Markdown),
            _ => None,
        }
    }

    // Fallback for servers that send text/plain or nothing at all
    pub fn from_extension(url: &str) -> Option<Self> {
        let path = Url::parse(url).ok()?.path().to_ascii_lowercase();
        if path.ends_with(".nq") {
            Some(MediaType::NQuads)
        } else if path.ends_with(".nt") {
            Some(MediaType::NTriples)
        } else if path.ends_with(".html") || path.ends_with(".htm") {
            Some(MediaType::Html)
        } else if path.ends_with(".md") || path.ends_with(".markdown") {
            Some(MediaType::Markdown)
        } else {
            None
        }
    }

    // Preference order sent in the Accept header
    pub fn accept_header() -> &'static str {
        "application/n-quads,application/n-triples;q=0.9,text/html;q=0.5,text/markdown;q=0.4"
    }
}

// Parses `body` as `media_type`. `base_url` is the document's own URL, used as
// subject for HTML/Markdown links and for resolving relative references.
pub fn parse_document(media_type: MediaType, body: &str, base_url: &str) -> Result<Vec<Quad>> {
    match media_type {
        MediaType::NQuads | MediaType::NTriples => parse_nquads(body),
        MediaType::Html => parse_html(body, base_url),
        MediaType::Markdown => parse_markdown(body, base_url),
    }
}

// Resolves a possibly-relative reference against `base`.
// Only http(s) results are kept; mailto:, tel:, javascript: and friends are not
// documents we can traverse.
pub(crate) fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => base.join(href).ok()?,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_base(base_url: &str) -> Result<Url> {
    match Url::parse(base_url) {
        Ok(url) => Ok(url),
        Err(e) => bail!("invalid document URL '{}': {}", base_url, e),
    }
}
