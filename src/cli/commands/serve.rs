//! Serve command: run the metrics endpoint.

use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::http;
use crate::kv::RedisKv;
use crate::metrics::MetricsReader;

/// Serve the line-protocol and JSON metrics endpoints.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address override, e.g. 0.0.0.0:9464.
    #[arg(long)]
    pub listen: Option<String>,
}

pub async fn run_serve(settings: Settings, args: ServeArgs) -> Result<()> {
    if !settings.prometheus.enabled {
        return Err(Error::Config(
            "prometheus endpoint is disabled; set prometheus.enabled = true".into(),
        ));
    }
    if settings.prometheus.middleware.as_deref() == Some("ip_whitelist")
        && settings.prometheus.ip_whitelist.is_empty()
    {
        warn!("ip_whitelist middleware with an empty list: every scrape will get 403");
    }

    let kv = Arc::new(RedisKv::connect(&settings.redis.connection).await?);
    let reader = Arc::new(MetricsReader::new(kv, settings.redis.prefix.clone()));
    let router = http::router(reader, &settings.prometheus)?;

    let addr = args
        .listen
        .unwrap_or_else(|| settings.prometheus.listen.clone());
    let listener = TcpListener::bind(&addr).await?;
    info!(
        route = %settings.prometheus.route,
        middleware = settings.prometheus.middleware.as_deref().unwrap_or("none"),
        "serving metrics"
    );

    http::serve(listener, router, shutdown_signal()).await
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("failed to install Ctrl+C handler, continuing without it");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, continuing without it");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
