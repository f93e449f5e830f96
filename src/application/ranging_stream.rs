// Ranging scan stream - Periodic polling of the scan endpoint
use crate::application::orchestrator::ProducerEvent;
use crate::application::worker::WorkerHandle;
use crate::domain::errors::RangingError;
use crate::domain::ranging::RangingScan;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[async_trait]
pub trait RangingSource: Send + Sync {
    async fn fetch(&self, host: &str) -> Result<RangingScan, RangingError>;
}

#[derive(Clone)]
pub struct RangingScanStream {
    source: Arc<dyn RangingSource>,
    period: Duration,
}

impl RangingScanStream {
    pub fn new(source: Arc<dyn RangingSource>, period: Duration) -> Self {
        Self { source, period }
    }

    /// Poll `host` every period until stopped. Failures leave the previous
    /// scan in place and never end the loop.
    pub fn start(&self, host: String, events: mpsc::Sender<ProducerEvent>) -> WorkerHandle {
        let stream = self.clone();
        WorkerHandle::spawn("ranging", move |cancel| async move {
            let mut ticker = tokio::time::interval(stream.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    fetched = stream.source.fetch(&host) => fetched,
                };

                match fetched {
                    Ok(scan) => {
                        tracing::debug!(
                            "Ranging scan from {} with {} readings",
                            host,
                            scan.distances().len()
                        );
                        if events.send(ProducerEvent::Scan(scan)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Ranging poll of {} failed: {}", host, e);
                    }
                }
            }
        })
    }
}
