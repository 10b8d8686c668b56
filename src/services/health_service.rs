use crate::gateway::CarrierGateway;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
struct Metrics {
    status: Gauge<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("mercury-server");
        Self {
            status: meter
                .i64_gauge("mercury_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

#[derive(Debug)]
pub struct HealthService {
    gateway: Arc<dyn CarrierGateway>,
    gateway_timeout: Duration,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(gateway: Arc<dyn CarrierGateway>, gateway_timeout_ms: u64) -> Self {
        Self {
            gateway,
            gateway_timeout: Duration::from_millis(gateway_timeout_ms),
            metrics: Metrics::new(),
        }
    }

    /// Checks upstream gateway reachability.
    ///
    /// # Errors
    /// Returns a string describing the failure if the gateway is unreachable.
    pub async fn check_gateway(&self) -> Result<(), String> {
        match timeout(self.gateway_timeout, self.gateway.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "gateway")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "gateway")]);
                Err(format!("Gateway check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "gateway")]);
                Err("Gateway check timed out".to_string())
            }
        }
    }
}
