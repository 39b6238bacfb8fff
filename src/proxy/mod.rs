//! Proxy module - HTTP relay for drive files
//!
//! This module is organized into submodules:
//! - `relay`: The download and health handlers
//! - `rate_limit`: Per-IP fixed-window limiter and its middleware
//! - `filename`: `Content-Disposition` encoding
//! - `error`: Error type and HTTP status mapping

mod error;
mod filename;
pub mod rate_limit;
mod relay;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use log::info;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ProxyConfig};
use crate::origin::OriginClient;

pub use error::{ErrorBody, ProxyError, STATUS_INTERRUPTED};
pub use filename::{content_disposition, encode_filename};
pub use rate_limit::{client_ip, RateLimitDecision, RateLimitStore};

/// Shared state for the proxy handlers
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub(crate) client: Client,
    pub(crate) origin: OriginClient,
    pub(crate) config: ProxyConfig,
    pub(crate) limiter: Arc<RateLimitStore>,
}

impl ProxyState {
    pub fn new(config: &AppConfig) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            origin: OriginClient::new(client.clone(), config.origin.api_base.clone()),
            client,
            config: config.proxy.clone(),
            limiter: Arc::new(RateLimitStore::new(&config.rate_limit)),
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimitStore> {
        &self.limiter
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/file/:id/download", get(relay::download_file))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .route("/health", get(relay::health))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    state: ProxyState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let purge_cancel = CancellationToken::new();
    let purger = state.limiter().spawn_purger(purge_cancel.clone());

    if let Ok(addr) = listener.local_addr() {
        info!("proxy_listen: addr={}", addr);
    }
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    purge_cancel.cancel();
    let _ = purger.await;
    info!("proxy_stopped");
    result
}

/// Bind `config.server.bind` and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let state = ProxyState::new(config)?;
    let listener = TcpListener::bind(config.server.bind).await?;
    serve_on(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("proxy_shutdown: ctrl-c received");
    })
    .await?;
    Ok(())
}
