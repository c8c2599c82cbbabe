//! Health check API endpoint.

use axum::extract::State;
use axum::Json;
use roomwatch_core::ConnectionState;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "version": "0.1.0",
    "device_id": "lab-1",
    "connection": "connected",
    "uptime_secs": 3600
}))]
pub struct HealthResponse {
    /// Always `ok` while the process is serving requests.
    #[schema(example = "ok")]
    pub status: String,

    /// Agent version from Cargo.toml.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Device identity registered with the hub.
    pub device_id: String,

    /// Hub connection state after the last tick.
    pub connection: ConnectionState,

    /// Seconds since the agent started.
    pub uptime_secs: u64,
}

/// Health check endpoint.
///
/// The process being up is reported as healthy even while the hub is
/// unreachable; `connection` tells the two apart.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check agent health",
    description = "Returns the agent version and current hub connection state.",
    responses(
        (status = 200, description = "Agent is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device_id: state.device_id().to_string(),
        connection: state.status().connection,
        uptime_secs: state.uptime_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::routing::get;
    use axum::Router;
    use axum_test::TestServer;
    use roomwatch_core::AgentStatus;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_health_reports_connection() {
        let (_tx, rx) = watch::channel(AgentStatus {
            connection: ConnectionState::TimeSyncing,
            ..AgentStatus::default()
        });
        let app = Router::new()
            .route("/health", get(health_check))
            .with_state(AppState::new(rx, "lab-1"));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.device_id, "lab-1");
        assert_eq!(body.connection, ConnectionState::TimeSyncing);
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            device_id: "lab-1".to_string(),
            connection: ConnectionState::Disconnected,
            uptime_secs: 5,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"connection\":\"disconnected\""));
    }
}
