// Video ingestion - Streams an HTTP body through the demuxer and decoder
use crate::application::frame_demuxer::FrameDemuxer;
use crate::application::orchestrator::ProducerEvent;
use crate::application::worker::WorkerHandle;
use crate::domain::errors::{DecodeError, NetworkError};
use crate::domain::video::{DecodedFrame, VideoFrame};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);
/// Pause before asking again for a body that ended without a single frame.
const EMPTY_SESSION_DELAY: Duration = Duration::from_secs(1);

pub type ChunkStream = BoxStream<'static, Result<Bytes, NetworkError>>;

#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Issue the GET and hand back the body as it arrives.
    async fn open(&self, url: &str) -> Result<ChunkStream, NetworkError>;
}

/// Turns an encoded frame into a raster. Takes ownership: the encoded bytes
/// are gone after this call whatever the outcome.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, frame: VideoFrame) -> Result<DecodedFrame, DecodeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    pub max_buffer_bytes: usize,
    /// `None` keeps the plain behavior: the first network error ends the feed.
    pub retry_backoff: Option<Duration>,
}

pub fn video_feed_url(address: &str) -> String {
    format!("http://{}/video_feed", address)
}

#[derive(Clone)]
pub struct VideoIngest {
    source: Arc<dyn VideoSource>,
    decoder: Arc<dyn ImageDecoder>,
    settings: VideoSettings,
}

impl VideoIngest {
    pub fn new(
        source: Arc<dyn VideoSource>,
        decoder: Arc<dyn ImageDecoder>,
        settings: VideoSettings,
    ) -> Self {
        Self {
            source,
            decoder,
            settings,
        }
    }

    pub fn spawn(&self, url: String, events: mpsc::Sender<ProducerEvent>) -> WorkerHandle {
        let ingest = self.clone();
        WorkerHandle::spawn("video", move |cancel| async move {
            let mut demuxer = FrameDemuxer::new(ingest.settings.max_buffer_bytes);
            let mut backoff = ingest.settings.retry_backoff.map(Backoff::new);
            tracing::info!("Video ingestion started for {}", url);

            'session: loop {
                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'session,
                    opened = ingest.source.open(&url) => opened,
                };

                let mut chunks = match opened {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        tracing::warn!("Video feed {} unavailable: {}", url, e);
                        match backoff.as_mut().map(Backoff::next_delay) {
                            Some(delay) => {
                                tokio::select! {
                                    biased;
                                    _ = cancel.cancelled() => break 'session,
                                    _ = tokio::time::sleep(delay) => continue 'session,
                                }
                            }
                            None => break 'session,
                        }
                    }
                };
                demuxer.discard_buffer();
                let mut delivered = false;

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break 'session,
                        next = chunks.next() => next,
                    };

                    match next {
                        Some(Ok(chunk)) => {
                            for frame in demuxer.push(&chunk) {
                                let Some(decoded) = ingest.decode(frame).await else {
                                    continue;
                                };
                                delivered = true;
                                if let Some(backoff) = backoff.as_mut() {
                                    backoff.reset();
                                }
                                tokio::select! {
                                    biased;
                                    _ = cancel.cancelled() => break 'session,
                                    sent = events.send(ProducerEvent::Frame(decoded)) => {
                                        if sent.is_err() {
                                            break 'session;
                                        }
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Video feed {} broke: {}", url, e);
                            match backoff.as_mut().map(Backoff::next_delay) {
                                Some(delay) => {
                                    tokio::select! {
                                        biased;
                                        _ = cancel.cancelled() => break 'session,
                                        _ = tokio::time::sleep(delay) => continue 'session,
                                    }
                                }
                                None => break 'session,
                            }
                        }
                        None if delivered => {
                            tracing::debug!("Video feed {} ended, requesting again", url);
                            continue 'session;
                        }
                        None => {
                            let delay = backoff
                                .as_mut()
                                .map_or(EMPTY_SESSION_DELAY, Backoff::next_delay);
                            tracing::debug!(
                                "Video feed {} ended without a frame ({} bytes unframed), requesting again in {:?}",
                                url,
                                demuxer.buffered_len(),
                                delay
                            );
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => break 'session,
                                _ = tokio::time::sleep(delay) => continue 'session,
                            }
                        }
                    }
                }
            }

            tracing::info!("Video ingestion for {} finished", url);
        })
    }

    async fn decode(&self, frame: VideoFrame) -> Option<DecodedFrame> {
        let sequence = frame.sequence;
        let decoder = self.decoder.clone();
        match tokio::task::spawn_blocking(move || decoder.decode(frame)).await {
            Ok(Ok(decoded)) => Some(decoded),
            Ok(Err(e)) => {
                tracing::debug!("Dropping frame {}: {}", sequence, e);
                None
            }
            Err(e) => {
                tracing::warn!("Decoder for frame {} panicked: {}", sequence, e);
                None
            }
        }
    }
}

#[derive(Debug)]
struct Backoff {
    initial: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_RETRY_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}
