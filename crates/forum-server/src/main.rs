//! # Forum Mailer
//!
//! Worker process for the forum mail queue. Delivers due jobs on a poll
//! interval, recovers stale claims and prunes old failures on a cron
//! schedule, and stops cleanly on Ctrl+C or SIGTERM.

use forum_config::{AppConfig, ConfigLoader};
use forum_core::{init_tracing, ForumError, ForumResult};
use forum_mailer::metrics::register_metrics;
use forum_server::MailService;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ConfigLoader::from_default_location() {
        Ok(loader) => loader.get().await,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting {}...", config.app.name);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> ForumResult<()> {
    if let Some(addr) = &config.observability.metrics_addr {
        install_metrics_exporter(addr)?;
    }

    if config.app.is_production() && !config.database.is_configured() {
        warn!("Running in production without a database: queued mail is lost on restart");
    }

    let service = MailService::build(&config).await?;
    service.run(shutdown_signal()).await?;

    info!("Shutdown complete");
    Ok(())
}

fn install_metrics_exporter(addr: &str) -> ForumResult<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| ForumError::Configuration(format!("Invalid metrics address {}: {}", addr, e)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ForumError::Internal(format!("Failed to install metrics exporter: {}", e)))?;
    register_metrics();

    info!("Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
