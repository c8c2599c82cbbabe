//! OpenAPI specification for the status API.

use axum::Json;
use roomwatch_core::{AgentStatus, ConnectionState};
use utoipa::OpenApi;

use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// OpenAPI document for the roomwatch agent.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "roomwatch API",
        version = "0.1.0",
        description = r"
# roomwatch API

Read-only status of a roomwatch device agent.

The agent keeps a session to the telemetry hub alive, samples temperature and
presence, and publishes one message per debounce window. This API exposes the
state observed after the most recent tick; it never triggers sampling or
publishing itself.
",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local roomwatch agent")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "telemetry", description = "Connection state and publish counters")
    ),
    paths(
        super::health::health_check,
        super::status::get_status,
    ),
    components(
        schemas(HealthResponse, AgentStatus, ConnectionState)
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "roomwatch API");
        assert!(spec.paths.paths.contains_key("/health"));
        assert!(spec.paths.paths.contains_key("/api/status"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = ApiDoc::openapi().to_pretty_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("AgentStatus"));
    }
}
