// src/extract/headers.rs
// =============================================================================
// Follows links announced in the HTTP `Link` response header.
//
// Example header:
//   Link: <meta.ttl>; rel="describedby", </page/2>; rel="next"
//
// Only entries whose rel contains one of the configured values are kept.
// Relative targets are resolved against the document URL.
// =============================================================================

use anyhow::Result;
use url::Url;

use super::{normalize_link_url, ExtractInput, LinkExtractor};
use crate::link::Link;

#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    rels: Vec<String>,
}

impl HeaderExtractor {
    pub fn new<I, S>(rels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HeaderExtractor {
            rels: rels
                .into_iter()
                .map(|rel| rel.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for HeaderExtractor {
    fn default() -> Self {
        HeaderExtractor::new(["describedby"])
    }
}

impl LinkExtractor for HeaderExtractor {
    fn extract(&self, input: &ExtractInput<'_>) -> Result<Vec<Link>> {
        let Some(header) = input.headers.get("link") else {
            return Ok(Vec::new());
        };
        let base = Url::parse(input.url)?;

        let links = parse_link_header(header)
            .into_iter()
            .filter(|(_, rels)| rels.iter().any(|rel| self.rels.contains(rel)))
            .filter_map(|(target, _)| base.join(&target).ok())
            .filter_map(|url| normalize_link_url(url.as_str()))
            .map(Link::new)
            .collect();
        Ok(links)
    }
}

// Splits a Link header into (target, rel values) pairs.
// Commas inside <...> or quotes don't separate entries.
fn parse_link_header(header: &str) -> Vec<(String, Vec<String>)> {
    let mut entries = Vec::new();
    let mut rest = header;

    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start + 1..].find('>') else {
            break;
        };
        let target = rest[start + 1..start + 1 + len].trim().to_string();
        rest = &rest[start + 1 + len + 1..];

        // parameters run until the next top-level comma
        let mut in_quotes = false;
        let end = rest
            .char_indices()
            .find(|&(_, c)| {
                if c == '"' {
                    in_quotes = !in_quotes;
                }
                c == ',' && !in_quotes
            })
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let params = &rest[..end];
        rest = &rest[end..];

        let rels = params
            .split(';')
            .filter_map(|param| {
                let (name, value) = param.split_once('=')?;
                if name.trim().eq_ignore_ascii_case("rel") {
                    Some(value.trim().trim_matches('"').to_string())
                } else {
                    None
                }
            })
            .flat_map(|value| {
                value
                    .split_ascii_whitespace()
                    .map(str::to_ascii_lowercase)
                    .collect::<Vec<_>>()
            })
            .collect();

        entries.push((target, rels));
    }

    entries
}
