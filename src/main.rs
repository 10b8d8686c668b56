#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use mercury_server::api::{AppState, MgmtState};
use mercury_server::config::Config;
use mercury_server::gateway::HttpCarrierGateway;
use mercury_server::registry::timezone::PrefixNumberLookup;
use mercury_server::registry::{RegistrySeed, StaticCampaignRegistry};
use mercury_server::services::ServiceContainer;
use mercury_server::workers::WebhookRetryWorker;
use mercury_server::{api, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, services) = async {
        // Phase 1: External collaborators
        let registry = Arc::new(StaticCampaignRegistry::new());
        if let Some(path) = &config.seed_path {
            let seed = RegistrySeed::from_file(path)?;
            registry.apply_seed(seed);
            tracing::info!(path = %path.display(), "Applied registry seed");
        }
        let lookup = Arc::new(PrefixNumberLookup::with_default_table());
        let gateway = Arc::new(HttpCarrierGateway::new(&config.gateway)?);

        // Phase 2: Component wiring (pure logic, no side effects)
        let services = ServiceContainer::build(&config, gateway, registry, lookup)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx.clone());

        // Phase 3: Runtime setup (listeners and routers)
        let app_router = api::app_router(AppState::from_services(&services));
        let mgmt_app = api::mgmt_router(MgmtState { health_service: Arc::clone(&services.health) });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((
            api_listener,
            mgmt_listener,
            app_router,
            mgmt_app,
            shutdown_tx,
            shutdown_rx,
            services,
        ))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start runtime (explicit spawning and listening)
    let retry_worker = WebhookRetryWorker::new(
        Arc::clone(&services.webhooks),
        Arc::clone(&services.events),
        config.webhook.worker_interval_secs,
        config.webhook.worker_batch,
    );
    let worker_tasks = vec![tokio::spawn(retry_worker.run(shutdown_rx.clone()))];

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router).with_graceful_shutdown(async move {
        let _ = api_rx.wait_for(|&s| s).await;
    });

    let mut mgmt_rx = shutdown_rx;
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app).with_graceful_shutdown(async move {
        let _ = mgmt_rx.wait_for(|&s| s).await;
    });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful shutdown orchestration
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });
}
