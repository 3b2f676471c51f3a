//! Generic HTTP fetch
//!
//! A browser-like client (cookies, gzip, browser headers) requests the URL.
//! When the body is not a PDF, the response is treated as an interstitial
//! HTML page: the `a#redirect` anchor is followed after a fixed backoff, up to
//! the configured number of hops.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;

use crate::config::HarvestConfig;
use crate::error::{Error, FetchError, Result};
use crate::fetch::validate::is_pdf;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anti-bot-aware fetcher shared by all download tasks
#[derive(Clone)]
pub struct GenericFetcher {
    client: reqwest::Client,
    max_hops: u32,
    backoff: Duration,
}

impl GenericFetcher {
    /// Build the shared client from the harvest settings.
    ///
    /// # Errors
    /// Returns [`Error::Other`] if the HTTP client cannot be created.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/pdf,text/html;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_hops: config.redirect_max_hops,
            backoff: config.redirect_backoff,
        })
    }

    /// Download `url` into `dest`, following interstitial redirect pages.
    ///
    /// At most `1 + max_hops` requests are made.
    pub async fn fetch(&self, url: &str, dest: &Path) -> std::result::Result<(), FetchError> {
        let mut current = url.to_string();

        for hop in 0..=self.max_hops {
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&current, &e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::RequestFailure {
                    url: current,
                    status: Some(status.as_u16()),
                    reason: format!("HTTP {}", status),
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::from_reqwest(&current, &e))?;

            if is_pdf(&body) {
                tokio::fs::write(dest, &body).await?;
                return Ok(());
            }

            if hop == self.max_hops {
                break;
            }

            let Some(next) = find_redirect(&body, &current) else {
                return Err(FetchError::InvalidContent {
                    url: current,
                    reason: "response is neither a PDF nor a redirect page".to_string(),
                });
            };

            tracing::debug!(
                from = %current,
                to = %next,
                hop = hop + 1,
                backoff_secs = self.backoff.as_secs_f64(),
                "Following redirect page"
            );
            tokio::time::sleep(self.backoff).await;
            current = next;
        }

        Err(FetchError::InvalidContent {
            url: current,
            reason: format!("no PDF after {} redirect pages", self.max_hops),
        })
    }
}

/// Target of the `a#redirect` anchor in an HTML page, resolved against `base`.
pub fn find_redirect(body: &[u8], base: &str) -> Option<String> {
    let selector = Selector::parse("a#redirect[href]").ok()?;
    let document = Html::parse_document(&String::from_utf8_lossy(body));
    let href = document
        .select(&selector)
        .next()?
        .value()
        .attr("href")?
        .trim()
        .to_string();
    if href.is_empty() {
        return None;
    }

    match url::Url::parse(base) {
        Ok(base) => base.join(&href).ok().map(String::from),
        Err(_) => Some(href),
    }
}
