use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signer as _, SigningKey};
use mercury_server::api::{self, AppState, MgmtState};
use mercury_server::config::{
    ComplianceConfig, Config, GatewayConfig, LogFormat, RateLimitConfig, ReplyConfig, ServerConfig,
    TelemetryConfig, WebhookConfig,
};
use mercury_server::domain::campaign::{BrandTier, Campaign, CampaignStatus, UseCase};
use mercury_server::gateway::{CarrierGateway, GatewayError};
use mercury_server::registry::StaticCampaignRegistry;
use mercury_server::registry::timezone::PrefixNumberLookup;
use mercury_server::services::ServiceContainer;
use mercury_server::workers::WebhookRetryWorker;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::sync::watch;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("mercury_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Scriptable stand-in for the upstream carrier gateway. Outcomes are
/// consumed in FIFO order; an empty script means every call succeeds with
/// a fresh external id.
#[derive(Debug, Default)]
pub struct MockGateway {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn enqueue_ok(&self, external_id: &str) {
        self.script.lock().unwrap().push_back(Ok(external_id.to_string()));
    }

    pub fn enqueue_unavailable(&self, count: usize) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..count {
            script.push_back(Err(GatewayError::Unavailable("503 service unavailable".into())));
        }
    }

    pub fn enqueue_rejected(&self, code: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::Rejected { code: code.into(), message: message.into() }));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CarrierGateway for MockGateway {
    async fn send_message(
        &self,
        _from: &str,
        _to: &str,
        _body: &str,
        _media_urls: &[String],
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(Uuid::new_v4().to_string()))
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub services: ServiceContainer,
    pub registry: Arc<StaticCampaignRegistry>,
    pub lookup: Arc<PrefixNumberLookup>,
    pub gateway: Arc<MockGateway>,
    pub signing_key: SigningKey,
    shutdown_tx: watch::Sender<bool>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[allow(dead_code)]
pub fn get_test_config(public_key: String) -> Config {
    Config {
        server: ServerConfig { host: "127.0.0.1".into(), port: 0, mgmt_port: 0, shutdown_timeout_secs: 5 },
        gateway: GatewayConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "test-key".into(),
            timeout_ms: 1000,
            max_retries: 3,
            retry_base_ms: 10,
            retry_max_ms: 50,
        },
        webhook: WebhookConfig {
            public_key,
            max_skew_secs: 300,
            max_attempts: 5,
            retry_base_secs: 0,
            retry_max_secs: 1,
            worker_interval_secs: 1,
            worker_batch: 50,
        },
        compliance: ComplianceConfig {
            quiet_open_hour: 8,
            quiet_close_hour: 21,
            content_rules_path: None,
        },
        rate_limit: RateLimitConfig { default_capacity: 100, default_refill_per_sec: 100.0 },
        replies: ReplyConfig {
            help_text: "Msg&Data rates may apply. Reply STOP to unsubscribe.".into(),
            stop_text: "You are unsubscribed. Reply START to resubscribe.".into(),
        },
        telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
        seed_path: None,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    pub async fn spawn_with(mutate: impl FnOnce(&mut Config)) -> Self {
        setup_tracing();

        let signing_key = SigningKey::from_bytes(&[42u8; 32]);
        let public_key = BASE64.encode(signing_key.verifying_key().as_bytes());

        let mut config = get_test_config(public_key);
        mutate(&mut config);

        let registry = Arc::new(StaticCampaignRegistry::new());
        let lookup = Arc::new(PrefixNumberLookup::with_default_table());
        let gateway = Arc::new(MockGateway::default());

        let gateway_dyn: Arc<dyn CarrierGateway> = gateway.clone();
        let registry_dyn: Arc<dyn mercury_server::registry::CampaignRegistry> = registry.clone();
        let lookup_dyn: Arc<dyn mercury_server::registry::timezone::NumberLookup> = lookup.clone();
        let services = ServiceContainer::build(&config, gateway_dyn, registry_dyn, lookup_dyn)
            .expect("service wiring");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app_router = api::app_router(AppState::from_services(&services));
        let mgmt_app = api::mgmt_router(MgmtState { health_service: Arc::clone(&services.health) });

        let api_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind api");
        let mgmt_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mgmt");
        let server_url = format!("http://{}", api_listener.local_addr().expect("api addr"));
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().expect("mgmt addr"));

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router)
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .expect("api server");
        });

        let mut mgmt_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_app)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .expect("mgmt server");
        });

        let retry_worker = WebhookRetryWorker::new(
            Arc::clone(&services.webhooks),
            Arc::clone(&services.events),
            config.webhook.worker_interval_secs,
            config.webhook.worker_batch,
        );
        tokio::spawn(retry_worker.run(shutdown_rx));

        Self {
            server_url,
            mgmt_url,
            client: reqwest::Client::new(),
            services,
            registry,
            lookup,
            gateway,
            signing_key,
            shutdown_tx,
        }
    }

    /// Posts a raw webhook body signed with the test key.
    pub async fn post_webhook(&self, body: &serde_json::Value) -> reqwest::Response {
        let raw = body.to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_webhook(&self.signing_key, &timestamp, &raw);

        self.client
            .post(format!("{}/v1/webhooks/gateway", self.server_url))
            .header("x-gateway-signature", signature)
            .header("x-gateway-timestamp", timestamp)
            .header("content-type", "application/json")
            .body(raw)
            .send()
            .await
            .expect("webhook request")
    }
}

#[allow(dead_code)]
pub fn sign_webhook(key: &SigningKey, timestamp: &str, body: &str) -> String {
    let mut signed = timestamp.as_bytes().to_vec();
    signed.push(b'|');
    signed.extend_from_slice(body.as_bytes());
    BASE64.encode(key.sign(&signed).to_bytes())
}

static NUMBER_SEQ: AtomicU32 = AtomicU32::new(0);

/// Fresh NYC-area number; area code 212 resolves to America/New_York in the
/// default lookup table.
#[allow(dead_code)]
pub fn fresh_number() -> String {
    let n = NUMBER_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("+1212444{n:04}")
}

#[allow(dead_code)]
pub struct SeededCampaign {
    pub campaign_id: Uuid,
    pub brand_id: Uuid,
    pub number: String,
}

#[allow(dead_code)]
pub fn seed_campaign(app: &TestApp, use_case: UseCase, status: CampaignStatus) -> SeededCampaign {
    seed_campaign_with(app, use_case, status, false, None)
}

#[allow(dead_code)]
pub fn seed_campaign_with(
    app: &TestApp,
    use_case: UseCase,
    status: CampaignStatus,
    quiet_hours_exempt: bool,
    tier: Option<BrandTier>,
) -> SeededCampaign {
    let campaign_id = Uuid::new_v4();
    let brand_id = Uuid::new_v4();
    let number = fresh_number();

    app.registry.insert_campaign(Campaign { id: campaign_id, brand_id, status, use_case, quiet_hours_exempt });
    if let Some(tier) = tier {
        app.registry.insert_brand_tier(brand_id, tier);
    }
    app.registry.assign_number(number.clone(), campaign_id);

    SeededCampaign { campaign_id, brand_id, number }
}

/// 19:00 UTC on a January weekday == 14:00 America/New_York.
#[allow(dead_code)]
pub const AFTERNOON_NY: &str = "2024-01-15T19:00:00Z";
/// 10:00 UTC on a January weekday == 05:00 America/New_York.
#[allow(dead_code)]
pub const EARLY_MORNING_NY: &str = "2024-01-15T10:00:00Z";

#[allow(dead_code)]
pub fn send_request(campaign: &SeededCampaign, to: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "campaign_id": campaign.campaign_id,
        "from": campaign.number,
        "to": to,
        "body": body,
        "scheduled_at": AFTERNOON_NY,
    })
}

#[allow(dead_code)]
pub fn lifecycle_event(event_id: &str, event_type: &str, external_id: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": event_id,
            "event_type": event_type,
            "occurred_at": chrono::Utc::now().to_rfc3339(),
            "payload": { "id": external_id },
        }
    })
}

#[allow(dead_code)]
pub fn inbound_event(event_id: &str, from: &str, to: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "id": event_id,
            "event_type": "message.received",
            "occurred_at": chrono::Utc::now().to_rfc3339(),
            "payload": { "from": from, "to": to, "text": text },
        }
    })
}

/// Polls a condition until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until(timeout_ms: u64, condition: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if condition() {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
}
