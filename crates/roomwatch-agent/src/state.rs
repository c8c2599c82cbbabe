//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use roomwatch_core::AgentStatus;
use tokio::sync::watch;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Alias used by the routers.
pub type SharedState = AppState;

struct AppStateInner {
    status: watch::Receiver<AgentStatus>,
    device_id: String,
    started_at: Instant,
}

impl AppState {
    /// Create state reading from the runner's status channel.
    pub fn new(status: watch::Receiver<AgentStatus>, device_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                status,
                device_id: device_id.into(),
                started_at: Instant::now(),
            }),
        }
    }

    /// Latest status snapshot.
    pub fn status(&self) -> AgentStatus {
        self.inner.status.borrow().clone()
    }

    /// Device identity registered with the hub.
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// Seconds since the agent started.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
