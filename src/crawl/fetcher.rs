//! Page fetcher abstraction and its reqwest-backed implementation.
//!
//! Grounded on the teacher's `scrapers::http_client::HttpClient`: a single
//! `reqwest::Client`, a polite inter-request delay, and status-driven
//! retry/backoff. Unlike the teacher, rendering is plain HTTP + HTML
//! (no headless browser dependency), since the specification's fetcher
//! contract only requires outbound links to be extractable from the
//! returned markup, which `scraper` already gives us in the extractor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{CodeDoxError, Result};

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub links: Vec<String>,
    pub final_url: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// `reqwest`-backed fetcher. One instance is shared across a job's workers;
/// the polite delay is applied per request so workers naturally serialize
/// against a single host even when several run concurrently against it.
pub struct ReqwestPageFetcher {
    client: Client,
    request_delay: Duration,
    content_size_limit: usize,
}

impl ReqwestPageFetcher {
    pub fn new(user_agent: &str, request_delay: Duration, content_size_limit: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| CodeDoxError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            request_delay,
            content_size_limit,
        })
    }

    /// Up to 3 retries with exponential backoff on 5xx and network errors;
    /// no retry on 4xx other than 408/429, and any `Retry-After` is honored.
    async fn fetch_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            let result = self.client.get(url).send().await;
            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() || status.is_redirection() {
                        return Ok(resp);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
                        if attempt >= 3 {
                            return Err(CodeDoxError::Fetch(format!("{url}: status {status} after retries")));
                        }
                        let delay = retry_after(&resp).unwrap_or_else(|| backoff_delay(attempt));
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    if status.is_server_error() {
                        if attempt >= 3 {
                            return Err(CodeDoxError::Fetch(format!("{url}: status {status} after retries")));
                        }
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(CodeDoxError::Fetch(format!("{url}: status {status}")));
                }
                Err(e) => {
                    if attempt >= 3 {
                        return Err(CodeDoxError::Fetch(format!("{url}: {e} after retries")));
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt))
}

fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let selector = Selector::parse("a[href]").unwrap();
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();

    document
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?.trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
            {
                return None;
            }
            match &base {
                Some(base) => base.join(href).ok().map(|u| {
                    let mut u = u;
                    u.set_fragment(None);
                    u.to_string()
                }),
                None => Some(href.to_string()),
            }
        })
        .collect()
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.fetch_with_retry(url).await?;
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CodeDoxError::Fetch(format!("{url}: {e}")))?;
        if bytes.len() > self.content_size_limit {
            return Err(CodeDoxError::Fetch(format!(
                "{url}: {} bytes exceeds content size limit of {}",
                bytes.len(),
                self.content_size_limit
            )));
        }
        let html = String::from_utf8_lossy(&bytes).into_owned();
        let links = extract_links(&html, &final_url);

        tokio::time::sleep(self.request_delay).await;

        Ok(FetchedPage {
            html,
            links,
            final_url,
            content_type,
        })
    }
}

/// Whitespace-collapsed, script/style-stripped text used as the basis for
/// `Document::compute_content_hash`, so cosmetic whitespace changes between
/// crawls don't look like content changes.
pub fn normalize_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let strip_selector = Selector::parse("script, style").unwrap();
    let mut fragment = html.to_string();
    for el in document.select(&strip_selector) {
        fragment = fragment.replace(&el.html(), "");
    }
    fragment.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_strips_script() {
        let html = "<html><body>\n  <p>Hello   world</p>\n  <script>track()</script>\n</body></html>";
        let normalized = normalize_html(html);
        assert!(!normalized.contains("track()"));
        assert!(normalized.contains("Hello world"));
    }

    #[test]
    fn extracts_absolute_and_relative_links() {
        let html = r#"<html><body><a href="/docs">Docs</a><a href="https://other.example/x">Other</a></body></html>"#;
        let links = extract_links(html, "https://example.com/start");
        assert!(links.contains(&"https://example.com/docs".to_string()));
        assert!(links.contains(&"https://other.example/x".to_string()));
    }
}
