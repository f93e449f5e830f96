// reqwest-backed video and ranging sources
use crate::application::ranging_stream::RangingSource;
use crate::application::video_ingest::{ChunkStream, VideoSource};
use crate::domain::errors::{NetworkError, RangingError};
use crate::domain::ranging::RangingScan;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct HttpVideoSource {
    client: reqwest::Client,
}

impl HttpVideoSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoSource for HttpVideoSource {
    async fn open(&self, url: &str) -> Result<ChunkStream, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| NetworkError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let url = url.to_string();
        let body = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|source| NetworkError::Body {
                url: url.clone(),
                source,
            })
        });
        Ok(body.boxed())
    }
}

#[derive(Debug, Clone)]
pub struct HttpRangingSource {
    client: reqwest::Client,
}

impl HttpRangingSource {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

pub fn lidar_url(host: &str) -> String {
    format!("http://{}/lidar", host)
}

#[async_trait]
impl RangingSource for HttpRangingSource {
    async fn fetch(&self, host: &str) -> Result<RangingScan, RangingError> {
        let url = lidar_url(host);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| NetworkError::Request {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(NetworkError::Status {
                url,
                status: response.status().as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| NetworkError::Body {
                url: url.clone(),
                source,
            })?;
        Ok(RangingScan::from_json(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DecodeError;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use bytes::Bytes;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_ranging_fetch() {
        let host = serve(Router::new().route("/lidar", get(|| async { "[0.5, 1.25, 9]" }))).await;
        let source = HttpRangingSource::new(Duration::from_secs(5)).unwrap();

        let scan = source.fetch(&host).await.unwrap();
        assert_eq!(scan.distances(), &[0.5, 1.25, 9.0]);
    }

    #[tokio::test]
    async fn test_ranging_soft_failures() {
        let host = serve(Router::new().route("/lidar", get(|| async { "not json" }))).await;
        let source = HttpRangingSource::new(Duration::from_secs(5)).unwrap();
        let result = source.fetch(&host).await;
        assert!(matches!(result, Err(RangingError::Decode(DecodeError::Json(_)))));

        let host = serve(Router::new().route(
            "/lidar",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "busy") }),
        ))
        .await;
        let result = source.fetch(&host).await;
        assert!(matches!(
            result,
            Err(RangingError::Network(NetworkError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_video_body_is_streamed() {
        let host = serve(Router::new().route(
            "/video_feed",
            get(|| async {
                let chunks = futures::stream::iter(vec![
                    Ok::<_, std::io::Error>(Bytes::from_static(&[0xFF, 0xD8, 1])),
                    Ok(Bytes::from_static(&[2, 0xFF, 0xD9])),
                ]);
                axum::body::Body::from_stream(chunks)
            }),
        ))
        .await;

        let source = HttpVideoSource::new();
        let chunks = source.open(&format!("http://{}/video_feed", host)).await.unwrap();
        let body: Vec<u8> = chunks
            .map(|chunk| chunk.unwrap().to_vec())
            .concat()
            .await;
        assert_eq!(body, vec![0xFF, 0xD8, 1, 2, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_video_error_status() {
        let host = serve(Router::new()).await;
        let result = HttpVideoSource::new()
            .open(&format!("http://{}/video_feed", host))
            .await;
        assert!(matches!(result, Err(NetworkError::Status { status: 404, .. })));
    }
}
