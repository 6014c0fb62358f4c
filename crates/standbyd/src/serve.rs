//! HTTP server: the output directory behind the waiting middleware.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use cachekey::CacheKey;
use standby::Waiter;
use standbyconf::StandbyConfig;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Server state for health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub waiter: Arc<Waiter>,
    pub key: CacheKey,
    pub start_time: Instant,
}

/// Health check endpoint
pub async fn handle_health(State(state): State<HealthState>) -> Json<serde_json::Value> {
    let status = if state.waiter.is_closed() {
        "closing"
    } else {
        "healthy"
    };

    Json(serde_json::json!({
        "status": status,
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "output_dir": state.waiter.dir().display().to_string(),
        "pattern": state.waiter.pattern().as_str(),
        "pending": state.waiter.pending(),
        "key": state.key.as_str(),
    }))
}

/// Build the waiter described by `config`.
pub fn build_waiter(config: &StandbyConfig) -> Result<Waiter> {
    let mut waiter = Waiter::new(&config.paths.output_dir, &config.watch.pattern)
        .context("Failed to create waiter")?
        .with_settle_delay(config.watch.settle_delay());
    if let Some(timeout) = config.watch.request_timeout() {
        waiter = waiter.with_request_timeout(timeout);
    }
    Ok(waiter)
}

/// Files from the output directory, held until they exist, plus `/health`.
pub fn router(waiter: &Arc<Waiter>, key: CacheKey) -> Router {
    let health_state = HealthState {
        waiter: Arc::clone(waiter),
        key,
        start_time: Instant::now(),
    };

    waiter
        .handle(Router::new().fallback_service(ServeDir::new(waiter.dir())))
        .route("/health", get(handle_health))
        .with_state(health_state)
        .layer(TraceLayer::new_for_http())
}

/// Run the server until SIGINT/SIGTERM or a fatal watcher error.
pub async fn run(config: StandbyConfig, key: CacheKey) -> Result<()> {
    let waiter = Arc::new(build_waiter(&config)?);

    info!(
        output_dir = %waiter.dir().display(),
        pattern = %waiter.pattern(),
        key = %key,
        "Standby starting"
    );

    let shutdown = CancellationToken::new();

    let watching = Arc::clone(&waiter);
    let watch_token = shutdown.clone();
    let watch_task = tokio::spawn(async move {
        let result = watching.serve().await;
        // Without a watcher nothing would ever be released
        watch_token.cancel();
        result
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let app = router(&waiter, key);

    let addr = config.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Standby ready on http://{}", addr);

    let closing = Arc::clone(&waiter);
    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            // Held requests must resolve or graceful shutdown never finishes
            closing.close();
        })
        .await
        .context("Server error")?;

    waiter.close();
    watch_task
        .await
        .context("Watch task panicked")?
        .context("Watcher failed")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
