use crate::config::GatewayConfig;
use crate::gateway::{CarrierGateway, GatewayError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JSON client for a Telnyx-style carrier aggregator.
#[derive(Debug)]
pub struct HttpCarrierGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    media_urls: &'a [String],
}

#[derive(Deserialize)]
struct SendMessageResponse {
    data: MessageData,
}

#[derive(Deserialize)]
struct MessageData {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: String,
}

impl HttpCarrierGateway {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn map_transport_error(err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl CarrierGateway for HttpCarrierGateway {
    async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<String, GatewayError> {
        let request = SendMessageRequest { from, to, text: body, media_urls };

        let response = self
            .client
            .post(format!("{}/v2/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::map_transport_error(&e))?;

        let status = response.status();
        if status.is_success() {
            let parsed: SendMessageResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Unavailable(format!("malformed gateway response: {e}")))?;
            return Ok(parsed.data.id);
        }

        let raw = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            let parsed: ErrorResponse = serde_json::from_str(&raw).unwrap_or(ErrorResponse { errors: Vec::new() });
            let (code, message) = parsed.errors.into_iter().next().map_or_else(
                || (status.as_u16().to_string(), raw),
                |e| (e.code, e.detail),
            );
            Err(GatewayError::Rejected { code, message })
        } else {
            Err(GatewayError::Unavailable(format!("gateway returned {status}")))
        }
    }

    async fn ping(&self) -> Result<(), String> {
        self.client
            .get(format!("{}/v2/health", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| format!("gateway unreachable: {e}"))
    }
}
