//! reqwest-backed [`WebClient`].

use super::extract::build_page;
use super::search::{parse_search_results, search_url};
use crate::config::constants::web;
use crate::tools::result::{FetchedPage, SearchResult};
use crate::tools::traits::WebClient;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_ENCODING, LOCATION};
use reqwest::{Client, redirect};
use std::io::Read;
use std::time::Duration;
use url::Url;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fetches pages with manual redirect handling so the hop count is capped
/// and every hop is logged.
#[derive(Clone)]
pub struct HttpWebClient {
    http: Client,
    search_endpoint: String,
}

impl HttpWebClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .user_agent(web::BROWSER_USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            search_endpoint: web::SEARCH_ENDPOINT.to_string(),
        })
    }

    /// Point searches at another HTML endpoint (tests, mirrors)
    pub fn with_search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.search_endpoint = endpoint.into();
        self
    }

    async fn get_following_redirects(&self, start: Url) -> Result<(Url, reqwest::Response)> {
        let mut current = start;
        for _ in 0..=web::MAX_REDIRECTS {
            let response = self
                .http
                .get(current.clone())
                .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(ACCEPT_ENCODING, "gzip")
                .timeout(Duration::from_secs(web::FETCH_TIMEOUT_SECS))
                .send()
                .await?;

            if !response.status().is_redirection() {
                return Ok((current, response));
            }
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| anyhow!("HTTP {}", response.status().as_u16()))?;
            let next = current
                .join(location)
                .with_context(|| format!("invalid redirect target '{location}'"))?;
            tracing::debug!(from = %current, to = %next, "following redirect");
            current = next;
        }
        bail!("Too many redirects")
    }
}

#[async_trait]
impl WebClient for HttpWebClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = search_url(&self.search_endpoint, query);

        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(web::SEARCH_TIMEOUT_SECS))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!("Search request failed: HTTP {}", status.as_u16());
        }
        let html = response.text().await?;
        Ok(parse_search_results(&html))
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let start = normalize_url(url)?;
        let (final_url, mut response) = self.get_following_redirects(start).await?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status.as_u16());
        }
        let gzip_header = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.eq_ignore_ascii_case("gzip"));

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= web::MAX_BODY_BYTES {
                body.truncate(web::MAX_BODY_BYTES);
                tracing::debug!(url = %final_url, "response body capped");
                break;
            }
        }
        if body.is_empty() {
            bail!("Empty response from server");
        }

        let html = decode_body(body, gzip_header)?;
        build_page(final_url.as_str(), &html)
    }
}

/// Accept bare hosts by defaulting to https
pub fn normalize_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("url is required");
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = Url::parse(&candidate).with_context(|| format!("invalid url '{raw}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => bail!("unsupported url scheme '{other}'"),
    }
}

/// Inflate gzip bodies flagged by header or magic bytes
fn decode_body(body: Vec<u8>, gzip_header: bool) -> Result<String> {
    if gzip_header || body.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        // A body capped mid-stream still yields the prefix decoded so far.
        let read = GzDecoder::new(body.as_slice()).read_to_end(&mut decoded);
        if let Err(err) = read
            && decoded.is_empty()
        {
            return Err(anyhow!(err).context("failed to decompress response"));
        }
        return Ok(String::from_utf8_lossy(&decoded).into_owned());
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn bare_hosts_default_to_https() -> Result<()> {
        assert_eq!(normalize_url("example.com/a")?.as_str(), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com")?.as_str(), "http://example.com/");
        assert!(normalize_url("ftp://example.com").is_err());
        assert!(normalize_url("  ").is_err());
        Ok(())
    }

    #[test]
    fn gzip_detected_by_magic_bytes() -> Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<html>hello</html>")?;
        let compressed = encoder.finish()?;

        assert_eq!(decode_body(compressed, false)?, "<html>hello</html>");
        assert_eq!(decode_body(b"plain".to_vec(), false)?, "plain");
        Ok(())
    }
}
