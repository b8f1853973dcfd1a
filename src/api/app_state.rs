use crate::observability::ChatMetrics;
use crate::services::Orchestrator;
use crate::storage::SessionStore;
use std::sync::Arc;

/// Application state shared by all chat handlers
#[derive(Clone)]
pub struct AppState {
    /// Provider fallback orchestrator
    pub orchestrator: Arc<Orchestrator>,
    /// Per-session chat history, shared with the orchestrator
    pub sessions: Arc<SessionStore>,
    /// Request and reply counters
    pub metrics: Arc<ChatMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("sessions", &self.sessions.session_count())
            .field("metrics", &"Arc<ChatMetrics>")
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        orchestrator: Orchestrator,
        sessions: Arc<SessionStore>,
        metrics: Arc<ChatMetrics>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            sessions,
            metrics,
        }
    }
}
