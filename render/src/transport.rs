//! HTTP transport used to fetch remote profiles
//!
//! One connection-pooling client is created per process and shared through
//! [`AppContext`](crate::context::AppContext). `https://` URLs are served
//! by rustls with the webpki root certificates.

use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::{Body, Client, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::error::SourceError;

static SHARED: OnceCell<Transport> = OnceCell::new();

/// Cheaply clonable handle to the process-wide HTTP client.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl Transport {
    /// The shared transport, created on first use.
    pub fn shared() -> Transport {
        SHARED
            .get_or_init(|| {
                info!("Initializing shared HTTP transport");
                let connector = HttpsConnectorBuilder::new()
                    .with_webpki_roots()
                    .https_or_http()
                    .enable_http1()
                    .build();
                Transport {
                    client: Client::builder().build(connector),
                }
            })
            .clone()
    }

    /// GET `url` and return the whole body.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            SourceError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(uri.scheme_str(), Some("http" | "https")) {
            return Err(SourceError::InvalidUrl {
                url: url.to_string(),
                reason: "only http:// and https:// URLs are supported".to_string(),
            });
        }

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(uri)
            .await
            .map_err(|source| SourceError::Http {
                url: url.to_string(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut body = response.into_body();
        let mut data = Vec::new();
        while let Some(chunk) = body.data().await {
            let chunk = chunk.map_err(|source| SourceError::Http {
                url: url.to_string(),
                source,
            })?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_is_initialized_once() {
        let _first = Transport::shared();
        let cell = SHARED.get().unwrap() as *const Transport;
        let _second = Transport::shared();
        assert_eq!(SHARED.get().unwrap() as *const Transport, cell);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_scheme() {
        let err = Transport::shared()
            .get("ftp://example.com/profile")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_https_goes_through_tls() {
        // A plain TCP peer that answers the ClientHello with garbage.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let url = format!("https://{}/debug/pprof/profile", addr);
        let err = Transport::shared().get(&url).await.unwrap_err();
        match err {
            SourceError::Http { url: failed, source } => {
                assert_eq!(failed, url);
                assert!(source.is_connect(), "unexpected error: {}", source);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_malformed_url() {
        let err = Transport::shared().get("http://[::1").await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidUrl { .. }));
    }
}
