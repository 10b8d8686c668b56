use crate::api::MgmtState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// Process liveness: answering at all is the signal.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness: the upstream gateway must be reachable before traffic is
/// routed here.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    match state.health_service.check_gateway().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}
