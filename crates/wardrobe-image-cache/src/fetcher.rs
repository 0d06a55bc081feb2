//! Remote blob fetching

use crate::error::{ImageCacheError, Result};
use crate::types::FetchedBlob;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Source of image bytes for the cache.
///
/// Any non-success response must be reported as an error so that nothing is
/// cached for it.
#[async_trait]
pub trait BlobFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob>;
}

/// HTTP GET fetcher backed by `reqwest`
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher that relies on the transport's default timeouts
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a fetcher with a per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageCacheError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobFetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBlob> {
        debug!(url = %url, "Fetching image");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch image");
            return Err(ImageCacheError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let data = response.bytes().await?;

        debug!(
            size = data.len(),
            content_type = %content_type,
            "Fetched image"
        );

        Ok(FetchedBlob { data, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheLimits, ImageCache};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jacket.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let blob = fetcher
            .fetch(&format!("{}/jacket.jpg", server.uri()))
            .await
            .unwrap();

        assert_eq!(blob.data.as_ref(), &[0xFF, 0xD8, 0xFF]);
        assert_eq!(blob.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_fetch_default_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let blob = fetcher
            .fetch(&format!("{}/blob", server.uri()))
            .await
            .unwrap();

        assert_eq!(blob.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(5)).unwrap();
        let url = format!("{}/missing.png", server.uri());
        let result = fetcher.fetch(&url).await;

        match result {
            Err(ImageCacheError::Status { url: failed, status }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cache_fetches_once_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/outfit.webp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/webp")
                    .set_body_bytes(vec![1u8; 1024]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = ImageCache::new(Arc::new(HttpFetcher::new()), CacheLimits::default());
        let url = format!("{}/outfit.webp", server.uri());

        let first = cache.get_image(&url).await;
        let second = cache.get_image(&url).await;

        assert_eq!(first, second);
        assert_eq!(first.as_cached().map(|i| i.size()), Some(1024));
        assert_eq!(cache.get_cache_info().await.keys, vec![url]);
    }

    #[tokio::test]
    async fn test_cache_falls_back_on_http_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = ImageCache::new(Arc::new(HttpFetcher::new()), CacheLimits::default());
        let url = format!("{}/img.png", server.uri());

        let handle = cache.get_image(&url).await;
        assert_eq!(handle.source(), url.as_str());
        assert_eq!(cache.get_cache_info().await.count, 0);
    }

    #[tokio::test]
    async fn test_fetch_malformed_url() {
        let fetcher = HttpFetcher::new();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(ImageCacheError::Http(_))));
    }
}
