use crate::gateway::GatewayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),
    #[error("Gateway rejected the message: {code}: {message}")]
    DispatchRejected { message_id: Uuid, code: String, message: String },
    #[error("Dispatch failed after retries")]
    DispatchFailed {
        message_id: Uuid,
        #[source]
        source: GatewayError,
    },
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, json!({ "error": "Not found" }))
            }
            Self::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            Self::Conflict(msg) => {
                tracing::debug!(message = %msg, "Conflict");
                (StatusCode::CONFLICT, json!({ "error": msg }))
            }
            Self::WebhookVerification(msg) => {
                // Security-relevant: a caller presented an invalid or replayed signature.
                tracing::warn!(message = %msg, "Webhook verification failed");
                (StatusCode::UNAUTHORIZED, json!({ "error": "Webhook verification failed" }))
            }
            Self::DispatchRejected { message_id, code, message } => {
                tracing::warn!(%message_id, code = %code, message = %message, "Gateway rejected message");
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": message, "code": code, "message_id": message_id }),
                )
            }
            Self::DispatchFailed { message_id, source } => {
                tracing::error!(%message_id, error = %source, "Dispatch failed after retries");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": source.to_string(), "message_id": message_id }),
                )
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}
