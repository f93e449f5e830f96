// Worker lifecycle - Cancellation token plus join
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct WorkerHandle {
    name: &'static str,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// The worker gets a child token; it is cancelled by `stop` or when the
    /// handle is dropped.
    pub fn spawn<F, Fut>(name: &'static str, worker: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(worker(cancel.child_token()));
        Self { name, cancel, join }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel and wait until the worker has actually returned.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.join).await {
            tracing::warn!("{} worker ended abnormally: {}", self.name, e);
        }
        tracing::debug!("{} worker stopped", self.name);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
