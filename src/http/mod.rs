//! Optional HTTP metrics endpoint.
//!
//! Serves the line-protocol body on the configured route and the
//! per-partition JSON document on `<route>/json`. Requests pass an
//! IP gate first; sources outside the allow-list get a bare 403.

mod allowlist;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::PrometheusSettings;
use crate::error::{Error, Result};
use crate::metrics::{render_prometheus, MetricsReader};

pub use allowlist::IpAllowlist;

/// Request gate in front of both endpoints.
#[derive(Clone)]
enum Gate {
    /// No middleware configured: every source may scrape.
    Open,
    /// `ip_whitelist` middleware: exact addresses and CIDR ranges.
    Allowlist(Arc<IpAllowlist>),
}

impl Gate {
    fn allows(&self, addr: &SocketAddr) -> bool {
        match self {
            Gate::Open => true,
            Gate::Allowlist(list) => list.allows(addr.ip()),
        }
    }
}

#[derive(Clone)]
struct AppState {
    reader: Arc<MetricsReader>,
    gate: Gate,
}

/// Build the metrics router from configuration. Fails fast on a
/// malformed route, a bad allow-list entry, or the unsupported
/// `basic_auth` middleware rather than serving a half-configured
/// endpoint.
pub fn router(reader: Arc<MetricsReader>, settings: &PrometheusSettings) -> Result<Router> {
    let route = settings.route.as_str();
    if !route.starts_with('/') || route == "/" {
        return Err(Error::Config(format!("invalid metrics route '{route}'")));
    }

    let gate = match settings.middleware.as_deref() {
        None | Some("") | Some("none") => Gate::Open,
        Some("ip_whitelist") => {
            Gate::Allowlist(Arc::new(IpAllowlist::parse(&settings.ip_whitelist)?))
        }
        Some("basic_auth") => return Err(Error::Unsupported("basic_auth metrics middleware")),
        Some(other) => {
            return Err(Error::Config(format!("unknown metrics middleware '{other}'")))
        }
    };

    let state = AppState { reader, gate };
    Ok(Router::new()
        .route(route, get(metrics_text))
        .route(&format!("{route}/json"), get(metrics_json))
        .with_state(state))
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "metrics endpoint listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

async fn metrics_text(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if !state.gate.allows(&addr) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let snapshot = state.reader.snapshot().await;
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        render_prometheus(&snapshot),
    )
        .into_response()
}

async fn metrics_json(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if !state.gate.allows(&addr) {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(state.reader.snapshot().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn reader() -> Arc<MetricsReader> {
        Arc::new(MetricsReader::new(Arc::new(MemoryKv::new()), "bq"))
    }

    fn settings(middleware: Option<&str>, whitelist: &[&str]) -> PrometheusSettings {
        PrometheusSettings {
            enabled: true,
            listen: "127.0.0.1:9464".into(),
            route: "/metrics".into(),
            middleware: middleware.map(|s| s.to_string()),
            ip_whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn router_builds_with_allowlist() {
        let s = settings(Some("ip_whitelist"), &["10.0.0.0/8", "127.0.0.1"]);
        assert!(router(reader(), &s).is_ok());
    }

    #[test]
    fn basic_auth_is_rejected_at_build_time() {
        let err = router(reader(), &settings(Some("basic_auth"), &[])).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn unknown_middleware_is_rejected() {
        let err = router(reader(), &settings(Some("oauth"), &[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_route_is_rejected() {
        let mut s = settings(None, &[]);
        s.route = "metrics".into();
        assert!(router(reader(), &s).is_err());
    }

    #[test]
    fn gate_decisions_match_the_allow_list() {
        let list = IpAllowlist::parse(&["10.0.0.0/8".to_string(), "127.0.0.1".to_string()])
            .map(Arc::new)
            .unwrap();
        let gate = Gate::Allowlist(list);
        let allowed: SocketAddr = "10.255.255.254:50000".parse().unwrap();
        let denied: SocketAddr = "11.0.0.1:50000".parse().unwrap();
        let local: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        assert!(gate.allows(&allowed));
        assert!(!gate.allows(&denied));
        assert!(gate.allows(&local));

        let empty = Gate::Allowlist(Arc::new(IpAllowlist::default()));
        assert!(!empty.allows(&local));

        assert!(Gate::Open.allows(&denied));
    }
}
