// src/parse/html.rs
// =============================================================================
// This module turns an HTML page into quads.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
//
// What becomes a quad (the page URL is always the subject):
// - <a href="x">            -> <page> rdfs:seeAlso <x>
// - <link rel="next" href>  -> <page> xhv:next <x>   (one quad per rel token)
// - <title>Text</title>     -> <page> dcterms:title "Text"
// =============================================================================

use anyhow::{anyhow, Result};
use scraper::{Html, Selector};

use super::{parse_base, resolve_url, DCTERMS_TITLE, RDFS_SEE_ALSO, XHV};
use crate::rdf::{Quad, Term};

pub fn parse_html(html: &str, base_url: &str) -> Result<Vec<Quad>> {
    let base = parse_base(base_url)?;
    let page = Term::iri(base.as_str());
    let document = Html::parse_document(html);
    let mut quads = Vec::new();

    let title = selector("title")?;
    if let Some(element) = document.select(&title).next() {
        let text = element.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            quads.push(Quad::triple(
                page.clone(),
                Term::iri(DCTERMS_TITLE),
                Term::literal(text),
            ));
        }
    }

    let anchors = selector("a[href]")?;
    for element in document.select(&anchors) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(target) = resolve_url(&base, href) {
            quads.push(Quad::triple(
                page.clone(),
                Term::iri(RDFS_SEE_ALSO),
                Term::iri(target),
            ));
        }
    }

    let links = selector("link[rel][href]")?;
    for element in document.select(&links) {
        let (Some(rel), Some(href)) = (element.value().attr("rel"), element.value().attr("href"))
        else {
            continue;
        };
        let Some(target) = resolve_url(&base, href) else {
            continue;
        };
        for token in rel.split_ascii_whitespace() {
            quads.push(Quad::triple(
                page.clone(),
                Term::iri(format!("{}{}", XHV, token.to_ascii_lowercase())),
                Term::iri(target.clone()),
            ));
        }
    }

    Ok(quads)
}

// Our selectors are constants, but scraper still hands back a Result
fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}
