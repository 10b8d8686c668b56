use async_trait::async_trait;
use thiserror::Error;

pub mod http;

pub use http::HttpCarrierGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Client error from the gateway (malformed number, blocked content).
    /// Never retried.
    #[error("gateway rejected the message: {code}: {message}")]
    Rejected { code: String, message: String },
    /// Server-side failure at the gateway. Retried with backoff.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    #[error("gateway request timed out")]
    Timeout,
}

impl GatewayError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Upstream carrier-aggregation gateway. One implementation talks HTTP to
/// the real aggregator; tests substitute a scriptable mock.
#[async_trait]
pub trait CarrierGateway: Send + Sync + std::fmt::Debug {
    /// Hands one message to the gateway, returning the gateway-assigned id.
    ///
    /// # Errors
    /// Returns `GatewayError::Rejected` for permanent client errors and
    /// `GatewayError::Unavailable`/`Timeout` for transient failures.
    async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<String, GatewayError>;

    /// Cheap reachability probe for readiness checks.
    ///
    /// # Errors
    /// Returns a string describing the failure if the gateway is unreachable.
    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}
