use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::RwLock;
use tokio::signal;
use tracing::info;

use turnstile::cli::Cli;
use turnstile::config::TurnstileConfig;
use turnstile::http::{router, AppState, HttpServer};
use turnstile::ratelimit::RateLimiter;
use turnstile::reload::spawn_rules_reload;
use turnstile::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = TurnstileConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    telemetry::init(&config.logging);

    info!("Starting Turnstile Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let rules = Arc::new(RwLock::new(config.load_rules()?));
    info!(routes = rules.read().routes.len(), "Route rules loaded");

    let rate_limiter = Arc::new(
        RateLimiter::new().with_cleanup_batch(config.rate_limiting.cleanup_batch),
    );
    info!(
        cleanup_batch = config.rate_limiting.cleanup_batch,
        "Rate limiter initialized"
    );

    let reload_secs = config.rate_limiting.rules_reload_interval_secs;
    if let (Some(path), true) = (&config.rate_limiting.rules_path, reload_secs > 0) {
        spawn_rules_reload(
            PathBuf::from(path),
            Duration::from_secs(reload_secs),
            rules.clone(),
        );
        info!(path = %path, interval_secs = reload_secs, "Route rules reload enabled");
    }

    let state = AppState::new(rate_limiter, rules);
    let app = router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::bind(config.server.http_addr, app)
        .await?
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Turnstile Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
