//! Publisher text-and-data-mining API clients
//!
//! One [`TdmClient`] is built per configured publisher at startup and shared
//! by every download task through `Arc<dyn PublisherApi>`. Callers take a
//! slot from the client's [`Throttle`] with [`PublisherApi::wait_for_slot`]
//! before each request; it is the only synchronization the shared session
//! needs.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use std::path::Path;
use std::time::Duration;

use crate::config::PublisherApiConfig;
use crate::error::{Error, FetchError, Result};
use crate::fetch::validate::PDF_MAGIC;
use crate::publisher::Publisher;
use crate::throttle::Throttle;

/// Authenticated full-text client for one publisher
#[async_trait]
pub trait PublisherApi: Send + Sync {
    /// Wait until another request may be sent
    async fn wait_for_slot(&self) {}

    /// Fetch the full text of `doi` into `dest`.
    ///
    /// Returns the HTTP status and the source name recorded as
    /// `harvester_used`. Non-success responses are
    /// [`FetchError::RequestFailure`]s and bodies that are not a PDF are
    /// [`FetchError::InvalidContent`].
    async fn download(&self, doi: &str, dest: &Path) -> std::result::Result<(u16, String), FetchError>;

    /// Publisher served by this client
    fn publisher(&self) -> Publisher;
}

/// Throttled reqwest client sending the publisher's token header
pub struct TdmClient {
    publisher: Publisher,
    base_url: String,
    client: reqwest::Client,
    throttle: Throttle,
}

impl TdmClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the token is not a valid header value and
    /// [`Error::Network`] if the HTTP client cannot be created.
    pub fn new(config: &PublisherApiConfig, timeout: Duration) -> Result<Self> {
        let publisher = config.publisher;
        let header_name =
            HeaderName::from_bytes(publisher.token_header().as_bytes()).map_err(|e| Error::Config {
                message: format!("invalid token header for {}: {}", publisher, e),
                key: Some("publisher".to_string()),
            })?;
        let token = HeaderValue::from_str(&config.token).map_err(|_| Error::Config {
            message: format!("token for {} is not a valid header value", publisher),
            key: Some("token".to_string()),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(header_name, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/pdf"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| publisher.api_base().to_string());

        Ok(Self {
            publisher,
            base_url,
            client,
            throttle: Throttle::new(config.throttle.clone()),
        })
    }

    /// Request URL for a DOI
    pub fn article_url(&self, doi: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/{}", base, urlencoding::encode(doi))
    }
}

#[async_trait]
impl PublisherApi for TdmClient {
    async fn wait_for_slot(&self) {
        self.throttle.acquire().await;
    }

    async fn download(&self, doi: &str, dest: &Path) -> std::result::Result<(u16, String), FetchError> {
        let url = self.article_url(doi);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RequestFailure {
                url,
                status: Some(status.as_u16()),
                reason: format!("{} API returned {}", self.publisher, status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, &e))?;
        if !body.starts_with(PDF_MAGIC) {
            return Err(FetchError::InvalidContent {
                url,
                reason: format!("{} API response is not a PDF", self.publisher),
            });
        }
        tokio::fs::write(dest, &body).await?;

        Ok((status.as_u16(), self.publisher.name().to_string()))
    }

    fn publisher(&self) -> Publisher {
        self.publisher
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleConfig;
    use tempfile::tempdir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> PublisherApiConfig {
        PublisherApiConfig {
            publisher: Publisher::Wiley,
            token: "secret-token".to_string(),
            base_url: Some(base_url.to_string()),
            throttle: ThrottleConfig::default(),
        }
    }

    #[tokio::test]
    async fn sends_token_and_writes_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles/10.1002%2Fabc.1"))
            .and(header("wiley-tdm-client-token", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 wiley".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            TdmClient::new(&config(&format!("{}/articles/", server.uri())), Duration::from_secs(5))
                .unwrap();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.pdf");

        let (status, source) = client.download("10.1002/abc.1", &dest).await.unwrap();

        assert_eq!(status, 200);
        assert_eq!(source, "wiley");
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 wiley");
    }

    #[tokio::test]
    async fn non_success_is_request_failure_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = TdmClient::new(&config(&server.uri()), Duration::from_secs(5)).unwrap();
        let dir = tempdir().unwrap();

        match client.download("10.1002/x", &dir.path().join("out.pdf")).await {
            Err(FetchError::RequestFailure { status, .. }) => assert_eq!(status, Some(403)),
            other => panic!("expected RequestFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn html_body_is_invalid_content_and_not_written() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Access denied</html>"))
            .mount(&server)
            .await;

        let client = TdmClient::new(&config(&server.uri()), Duration::from_secs(5)).unwrap();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.pdf");

        let result = client.download("10.1002/x", &dest).await;

        assert!(matches!(result, Err(FetchError::InvalidContent { .. })), "got {result:?}");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn wait_for_slot_holds_requests_past_the_window_limit() {
        let mut cfg = config("http://localhost");
        cfg.throttle = ThrottleConfig {
            max_requests: 1,
            window: Duration::from_millis(200),
            padding: Duration::ZERO,
        };
        let client = TdmClient::new(&cfg, Duration::from_secs(5)).unwrap();

        let start = std::time::Instant::now();
        client.wait_for_slot().await;
        client.wait_for_slot().await;

        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn invalid_token_is_config_error() {
        let mut cfg = config("http://localhost");
        cfg.token = "bad\ntoken".to_string();
        assert!(matches!(
            TdmClient::new(&cfg, Duration::from_secs(5)),
            Err(Error::Config { .. })
        ));
    }
}
