use crate::services::{
    ComplianceService, DispatchService, HealthService, ServiceContainer, WebhookService,
};
use crate::storage::{MessageStore, OptOutStore};
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod health;
pub mod messages;
pub mod middleware;
pub mod opt_outs;
pub mod webhooks;

#[derive(Clone, Debug)]
pub struct AppState {
    pub compliance: Arc<ComplianceService>,
    pub dispatcher: Arc<DispatchService>,
    pub webhooks: Arc<WebhookService>,
    pub messages: Arc<MessageStore>,
    pub opt_outs: Arc<OptOutStore>,
}

impl AppState {
    #[must_use]
    pub fn from_services(services: &ServiceContainer) -> Self {
        Self {
            compliance: Arc::clone(&services.compliance),
            dispatcher: Arc::clone(&services.dispatcher),
            webhooks: Arc::clone(&services.webhooks),
            messages: Arc::clone(&services.messages),
            opt_outs: Arc::clone(&services.opt_outs),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: Arc<HealthService>,
}

/// Configures and returns the primary application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(messages::send_message))
        .route("/v1/messages/{id}", get(messages::get_message))
        .route("/v1/opt-outs/{number}", get(opt_outs::list_for_number))
        .route("/v1/webhooks/gateway", post(webhooks::ingest))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
