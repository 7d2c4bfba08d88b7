//! Photo search client. One `flickr.photos.search` round trip per call,
//! returning public photos around a coordinate.
//!
//! The client keeps no state between calls: no caching, no retries, no
//! background work. The request runs on the caller's task, so callers that
//! must stay responsive spawn it onto a worker first. Failures of any kind
//! degrade to an empty result.

pub mod error;
mod response;

pub use error::SearchError;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::store::PhotoRecord;
use response::SearchResponse;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://www.flickr.com";

const SEARCH_METHOD: &str = "flickr.photos.search";
/// Large image URL, upload date and geo position.
const SEARCH_EXTRAS: &str = "url_l,date_upload,geo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can look up photos around a coordinate.
///
/// Implementations must be best-effort: a failed lookup returns an empty
/// list, never an error.
#[async_trait]
pub trait PhotoSearch: Send + Sync {
    async fn search(&self, latitude: f64, longitude: f64, radius_km: f32) -> Vec<PhotoRecord>;
}

/// HTTP client for the Flickr REST search endpoint.
#[derive(Clone)]
pub struct PhotoSearchClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for PhotoSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoSearchClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl PhotoSearchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SearchError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url, api_key))
    }

    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/services/rest/", self.base_url)
    }

    async fn try_search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f32,
    ) -> Result<Vec<PhotoRecord>, SearchError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[
                ("method", SEARCH_METHOD.to_string()),
                ("api_key", self.api_key.clone()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("radius", radius_km.to_string()),
                ("radius_units", "km".to_string()),
                ("extras", SEARCH_EXTRAS.to_string()),
                ("format", "json".to_string()),
                ("nojsoncallback", "1".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(SearchError::EmptyBody);
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_records())
    }
}

#[async_trait]
impl PhotoSearch for PhotoSearchClient {
    async fn search(&self, latitude: f64, longitude: f64, radius_km: f32) -> Vec<PhotoRecord> {
        match self.try_search(latitude, longitude, radius_km).await {
            Ok(records) => {
                tracing::debug!(
                    latitude,
                    longitude,
                    radius_km,
                    found = records.len(),
                    "Photo search completed"
                );
                records
            }
            Err(e) => {
                tracing::warn!(latitude, longitude, error = %e, "Photo search failed, skipping this location");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve exactly one HTTP response and report the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request);
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        (format!("http://{addr}"), rx)
    }

    #[tokio::test]
    async fn test_success_returns_normalized_records() {
        let (base_url, _) =
            serve_once("200 OK", r#"{"photos":{"photo":[{"id":"1","owner":"A","unused":"y"}]}}"#).await;
        let client = PhotoSearchClient::new(base_url, "test_api_key").unwrap();

        let records = client.search(3.0, 4.0, 0.2).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
        assert_eq!(records[0].owner, "A");
        assert_eq!(records[0].title, "");
        assert_eq!(records[0].latitude, 0.0);
        assert_eq!(records[0].longitude, 0.0);
        assert_eq!(records[0].width, 0);
        assert_eq!(records[0].height, 0);
        assert_eq!(records[0].uploaded_at, 0);
    }

    #[tokio::test]
    async fn test_request_carries_search_parameters() {
        let (base_url, request) = serve_once("200 OK", r#"{"photos":{"photo":[]}}"#).await;
        let client = PhotoSearchClient::new(format!("{base_url}/"), "test_api_key").unwrap();

        assert!(client.search(1.5, 2.5, 0.4).await.is_empty());

        let line = request.await.unwrap();
        assert!(line.starts_with("GET /services/rest/?"), "{line}");
        for expected in [
            "method=flickr.photos.search",
            "api_key=test_api_key",
            "lat=1.5",
            "lon=2.5",
            "radius=0.4",
            "radius_units=km",
            "extras=url_l%2Cdate_upload%2Cgeo",
            "format=json",
            "nojsoncallback=1",
        ] {
            assert!(line.contains(expected), "missing {expected} in {line}");
        }
    }

    #[tokio::test]
    async fn test_not_found_returns_empty() {
        let (base_url, _) = serve_once("404 Not Found", "Not found").await;
        let client = PhotoSearchClient::new(base_url, "test_api_key").unwrap();
        assert!(client.search(1.0, 2.0, 0.2).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_returns_empty() {
        let (base_url, _) = serve_once("200 OK", "").await;
        let client = PhotoSearchClient::new(base_url, "test_api_key").unwrap();
        assert!(client.search(1.0, 2.0, 0.2).await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_body_returns_empty() {
        let (base_url, _) = serve_once("200 OK", "jsonFlickrApi({})").await;
        let client = PhotoSearchClient::new(base_url, "test_api_key").unwrap();
        assert!(client.search(1.0, 2.0, 0.2).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_returns_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = PhotoSearchClient::new(format!("http://{addr}"), "k").unwrap();
        assert!(client.search(1.0, 2.0, 0.2).await.is_empty());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = PhotoSearchClient::new(DEFAULT_BASE_URL, "secret").unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("secret"));
    }
}
