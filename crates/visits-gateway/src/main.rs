//! visits service binary.
//!
//! - Counter endpoint: POST /visits (configurable)
//! - Ops: /healthz, /readyz, /metrics
//! - Config path from `VISITS_CONFIG` (default `visits.yaml`), log filter from `RUST_LOG`
//! - Graceful shutdown on Ctrl-C: readiness flips to draining, in-flight requests finish

use tracing_subscriber::{fmt, EnvFilter};

use visits_core::error::{Result, VisitsError};
use visits_gateway::{app_state, config, router, storage};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, code = e.client_code().as_str(), "visits service failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen = cfg.server.listen_addr()?;

    // One backend handle for the process lifetime; dropped after serve returns.
    let backend = storage::open(&cfg)?;
    let state = app_state::AppState::new(cfg, backend)?;
    let app = router::build_router(state.clone());

    tracing::info!(
        %listen,
        config = %path,
        route = %state.cfg().server.route,
        counter = %state.counter(),
        backend = state.store().backend_kind(),
        "visits service starting"
    );
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| VisitsError::Internal(format!("failed to bind {listen}: {e}")))?;

    let draining = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            draining.set_draining();
            tracing::info!("shutdown signal received, draining");
        })
        .await
        .map_err(|e| VisitsError::Internal(format!("server failed: {e}")))?;

    tracing::info!("visits service stopped");
    Ok(())
}
