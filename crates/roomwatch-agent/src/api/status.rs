//! Agent status endpoint.

use axum::extract::State;
use axum::Json;
use roomwatch_core::AgentStatus;

use crate::state::SharedState;

/// Current agent status.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "telemetry",
    operation_id = "getStatus",
    summary = "Get agent status",
    description = "Returns the snapshot taken after the most recent tick: connection state, \
        last valid temperature, last presence verdict and publish counters.",
    responses(
        (status = 200, description = "Current status", body = AgentStatus)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<AgentStatus> {
    Json(state.status())
}
