// Application state for HTTP handlers
use crate::application::orchestrator::Orchestrator;
use crate::presentation::panel::PanelWatch;
use tokio::sync::Mutex;

pub struct AppState {
    /// `None` once shutdown has taken it.
    pub orchestrator: Mutex<Option<Orchestrator>>,
    pub panel: PanelWatch,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, panel: PanelWatch) -> Self {
        Self {
            orchestrator: Mutex::new(Some(orchestrator)),
            panel,
        }
    }

    pub async fn shutdown(&self) {
        let orchestrator = self.orchestrator.lock().await.take();
        if let Some(orchestrator) = orchestrator {
            orchestrator.shutdown().await;
        }
    }
}
