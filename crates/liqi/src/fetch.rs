//! Downloading record data the lobby only hands out by locator.
//!
//! Older records come back from `fetchGameRecord` with an empty `data`
//! field and a `data_url` pointing at the stored bytes instead. A
//! [`PayloadFetcher`] turns that URL into the same wrapped bytes the
//! inline field would have carried.

use std::future::Future;

/// Errors from fetching a record locator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("fetching {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The request could not be sent or its body not read.
    #[error("fetching {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No fetcher is available in this build.
    #[error("cannot fetch {url}: no payload fetcher configured")]
    Unsupported { url: String },
}

/// Resolves a record locator to its bytes.
///
/// # Example
///
/// ```rust
/// use liqi::{FetchError, PayloadFetcher};
///
/// /// Serves every locator from memory.
/// struct Canned(Vec<u8>);
///
/// impl PayloadFetcher for Canned {
///     async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait PayloadFetcher: Send + Sync + 'static {
    /// Downloads the bytes behind `url`.
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Fetcher that refuses every locator. Used when the `http` feature is
/// off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl PayloadFetcher for NoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Unsupported {
            url: url.to_string(),
        })
    }
}

/// HTTP(S) fetcher backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Creates a fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher that reuses `client` (proxies, timeouts, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl PayloadFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_failed = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            source: Box::new(e),
        };

        let response = self.client.get(url).send().await.map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_failed)?;
        tracing::debug!(url, bytes = body.len(), "fetched record data");
        Ok(body.to_vec())
    }
}

/// The fetcher a session uses unless told otherwise.
#[cfg(feature = "http")]
pub type DefaultFetcher = HttpFetcher;

/// The fetcher a session uses unless told otherwise.
#[cfg(not(feature = "http"))]
pub type DefaultFetcher = NoFetcher;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_fetcher_returns_unsupported() {
        let result = NoFetcher.fetch("https://records.example/abc").await;
        match result {
            Err(FetchError::Unsupported { url }) => {
                assert_eq!(url, "https://records.example/abc");
            }
            other => panic!("expected Unsupported, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_error_status_mentions_url_and_code() {
        let err = FetchError::Status {
            url: "https://records.example/abc".into(),
            status: 404,
        };
        let text = err.to_string();
        assert!(text.contains("records.example/abc"));
        assert!(text.contains("404"));
    }
}
