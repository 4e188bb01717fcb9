// src/dereference/http.rs
// =============================================================================
// Dereferences links over HTTP.
//
// Key functionality:
// - GET with an Accept header listing the formats we can parse
// - Follows up to 5 redirects; the final URL becomes the document URL
// - Picks a parser from Content-Type, falling back to the file extension
// - Non-2xx responses are errors (and so end the traversal), unless the
//   context asks for lenient handling
//
// No retry or backoff happens here: one request per link.
// =============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use super::{is_lenient, Dereferencer, Document};
use crate::link::{Link, QueryContext};
use crate::parse::{parse_document, MediaType};

pub struct HttpDereferencer {
    client: Client,
}

impl HttpDereferencer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("link-traversal/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(HttpDereferencer { client })
    }

    // Reuses an existing client (connection pool, proxies, ...)
    pub fn with_client(client: Client) -> Self {
        HttpDereferencer { client }
    }
}

#[async_trait]
impl Dereferencer for HttpDereferencer {
    async fn dereference(&self, link: &Link, context: &QueryContext) -> Result<Document> {
        let response = self
            .client
            .get(&link.url)
            .header(ACCEPT, MediaType::accept_header())
            .send()
            .await
            .with_context(|| format!("GET {}", link.url))?;

        let status = response.status();
        let url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let lenient = is_lenient(context);

        if !status.is_success() {
            if lenient {
                tracing::warn!(url = %link.url, %status, "Ignoring failed response");
                return Ok(Document::new(url, Vec::new(), headers));
            }
            return Err(anyhow!("HTTP {}", status.as_u16()));
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(MediaType::from_content_type)
            .or_else(|| MediaType::from_extension(&url));

        let body = response
            .text()
            .await
            .with_context(|| format!("reading body of {}", url))?;

        let parsed = match media_type {
            Some(media_type) => parse_document(media_type, &body, &url),
            None => Err(anyhow!(
                "unsupported content type {}",
                headers.get("content-type").map(String::as_str).unwrap_or("(none)")
            )),
        };

        let quads = match parsed {
            Ok(quads) => quads,
            Err(e) if lenient => {
                tracing::warn!(url = %url, error = %e, "Ignoring unparseable document");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(url = %url, quads = quads.len(), "Dereferenced document");
        Ok(Document::new(url, quads, headers))
    }
}

// Lower-cased header names, repeated headers joined the way HTTP allows
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, LINK};

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append(LINK, HeaderValue::from_static("<a>; rel=next"));
        headers.append(LINK, HeaderValue::from_static("<b>; rel=describedby"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));

        let collected = collect_headers(&headers);
        assert_eq!(
            collected.get("link").map(String::as_str),
            Some("<a>; rel=next, <b>; rel=describedby")
        );
        assert_eq!(collected.get("content-type").map(String::as_str), Some("text/html"));
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpDereferencer::new(Duration::from_secs(5)).is_ok());
    }
}
