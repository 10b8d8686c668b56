use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub webhook: WebhookConfig,

    #[command(flatten)]
    pub compliance: ComplianceConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub replies: ReplyConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    /// Path to a JSON file seeding campaigns, brand tiers and number assignments
    #[arg(long, env = "MERCURY_SEED_PATH")]
    pub seed_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "MERCURY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MERCURY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "MERCURY_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "MERCURY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Base URL of the upstream carrier gateway
    #[arg(long, env = "MERCURY_GATEWAY_BASE_URL", default_value = "https://api.carrier.example")]
    pub base_url: String,

    /// API key presented to the upstream gateway
    #[arg(long, env = "MERCURY_GATEWAY_API_KEY", default_value = "")]
    pub api_key: String,

    /// Request timeout for gateway calls
    #[arg(long, env = "MERCURY_GATEWAY_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Maximum retries after the initial attempt for transient gateway failures
    #[arg(long, env = "MERCURY_GATEWAY_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// Base delay for dispatch retry backoff
    #[arg(long, env = "MERCURY_GATEWAY_RETRY_BASE_MS", default_value_t = 250)]
    pub retry_base_ms: u64,

    /// Ceiling for dispatch retry backoff
    #[arg(long, env = "MERCURY_GATEWAY_RETRY_MAX_MS", default_value_t = 5_000)]
    pub retry_max_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct WebhookConfig {
    /// Base64-encoded Ed25519 public key used to verify gateway webhooks
    #[arg(long, env = "MERCURY_WEBHOOK_PUBLIC_KEY", default_value = "")]
    pub public_key: String,

    /// Maximum accepted skew between the webhook timestamp header and server time
    #[arg(long, env = "MERCURY_WEBHOOK_MAX_SKEW_SECS", default_value_t = 300)]
    pub max_skew_secs: i64,

    /// Processing attempts before a webhook event is marked permanently failed
    #[arg(long, env = "MERCURY_WEBHOOK_MAX_ATTEMPTS", default_value_t = 5)]
    pub max_attempts: u32,

    /// Base delay for webhook reprocessing backoff
    #[arg(long, env = "MERCURY_WEBHOOK_RETRY_BASE_SECS", default_value_t = 2)]
    pub retry_base_secs: u64,

    /// Ceiling for webhook reprocessing backoff
    #[arg(long, env = "MERCURY_WEBHOOK_RETRY_MAX_SECS", default_value_t = 300)]
    pub retry_max_secs: u64,

    /// How often the retry worker scans for due events
    #[arg(long, env = "MERCURY_WEBHOOK_WORKER_INTERVAL_SECS", default_value_t = 1)]
    pub worker_interval_secs: u64,

    /// Maximum events reprocessed per worker tick
    #[arg(long, env = "MERCURY_WEBHOOK_WORKER_BATCH", default_value_t = 50)]
    pub worker_batch: usize,
}

#[derive(Clone, Debug, Args)]
pub struct ComplianceConfig {
    /// Local hour (inclusive) at which sending becomes allowed
    #[arg(long, env = "MERCURY_QUIET_OPEN_HOUR", default_value_t = 8)]
    pub quiet_open_hour: u32,

    /// Local hour (exclusive) at which sending becomes blocked
    #[arg(long, env = "MERCURY_QUIET_CLOSE_HOUR", default_value_t = 21)]
    pub quiet_close_hour: u32,

    /// Path to a JSON content-rule table; built-in rules are used when unset
    #[arg(long, env = "MERCURY_CONTENT_RULES_PATH")]
    pub content_rules_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Token-bucket capacity for brands without a registered throughput tier
    #[arg(long, env = "MERCURY_RATE_DEFAULT_CAPACITY", default_value_t = 6)]
    pub default_capacity: u32,

    /// Token refill rate (tokens/second) for brands without a registered tier
    #[arg(long, env = "MERCURY_RATE_DEFAULT_REFILL_PER_SEC", default_value_t = 1.0)]
    pub default_refill_per_sec: f64,
}

#[derive(Clone, Debug, Args)]
pub struct ReplyConfig {
    /// Reply sent after a HELP-family keyword
    #[arg(
        long,
        env = "MERCURY_HELP_REPLY",
        default_value = "Msg&Data rates may apply. For support visit https://mercury-sms.dev/help. Reply STOP to unsubscribe."
    )]
    pub help_text: String,

    /// Confirmation sent after a STOP-family keyword
    #[arg(
        long,
        env = "MERCURY_STOP_REPLY",
        default_value = "You are unsubscribed and will receive no further messages. Reply START to resubscribe."
    )]
    pub stop_text: String,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces and metrics; telemetry export is disabled when unset
    #[arg(long, env = "MERCURY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "MERCURY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
