//! HTTP surface of the aggregator.
//!
//! Endpoints:
//! - `POST /products/get` streams product batches for a search
//! - `GET /health` liveness check

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::responder::stream_batches;
use axum::Router;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde::Deserialize;
use shopstream_scrape::types::{MAX_SAMPLING_RATE, MIN_SAMPLING_RATE};
use shopstream_scrape::{Orchestrator, ScrapeRequest, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /products/get`. Every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductsRequest {
    /// Storefront names; missing or empty means all of them.
    pub stores: Option<Vec<String>>,
    /// Search query.
    pub query: String,
    /// Pages per storefront; values below 1 mean 1.
    pub max_page: i64,
    /// Sampling rate for image enrichment, `1..=10`. Defaults to 10.
    pub fast_load: Option<i64>,
    /// Drop incomplete or approximate products.
    pub strict_search: bool,
    /// First page to visit; values below 1 mean 1.
    pub page: i64,
}

impl ProductsRequest {
    /// Convert into a scrape request, applying defaults.
    ///
    /// Unknown store names are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidSamplingRate`] if `fastLoad` is outside
    /// `1..=10`.
    pub fn into_scrape_request(self) -> Result<ScrapeRequest> {
        let fast_load = self.fast_load.unwrap_or(i64::from(MAX_SAMPLING_RATE));
        let sampling_rate = u8::try_from(fast_load)
            .ok()
            .filter(|r| (MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(r))
            .ok_or(ServerError::InvalidSamplingRate(fast_load))?;

        let mut request = ScrapeRequest {
            max_pages: positive_or_one(self.max_page),
            start_page: positive_or_one(self.page),
            sampling_rate,
            strict_search: self.strict_search,
            ..ScrapeRequest::new(self.query)
        };

        if let Some(names) = self.stores.filter(|names| !names.is_empty()) {
            let stores = names.iter().filter_map(|name| match name.parse::<Store>() {
                Ok(store) => Some(store),
                Err(_) => {
                    tracing::warn!(store = %name, "unknown store skipped");
                    None
                }
            });
            request = request.with_stores(stores);
        }

        Ok(request)
    }
}

fn positive_or_one(value: i64) -> u32 {
    u32::try_from(value).ok().filter(|v| *v > 0).unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Build the service router around `orchestrator`.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/products/get", post(handle_get_products))
        .layer(cors)
        .with_state(AppState { orchestrator })
}

/// Bind `config.bind_addr()` and serve until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server stops
/// with an I/O error.
pub async fn run_server(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    info!("shopstream listening on http://{local_addr}");
    axum::serve(listener, router(orchestrator)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// ShopstreamServer
// ---------------------------------------------------------------------------

/// A server running in a background task, for embedding and tests.
pub struct ShopstreamServer {
    /// The address the server is listening on.
    addr: SocketAddr,
    /// Handle to the background server task.
    handle: JoinHandle<()>,
}

impl ShopstreamServer {
    /// Bind `{host}:{port}` (port `0` for auto-assign) and serve in a
    /// background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(
        orchestrator: Arc<Orchestrator>,
        host: &str,
        port: u16,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        let app = router(orchestrator);

        info!("shopstream listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("shopstream server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ShopstreamServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// `POST /products/get`: stream batches for the requested search.
async fn handle_get_products(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let payload: ProductsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProductsRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?
    };

    let request = payload.into_scrape_request()?;
    tracing::trace!(
        query = %request.query,
        stores = ?request.stores,
        max_pages = request.max_pages,
        start_page = request.start_page,
        sampling_rate = request.sampling_rate,
        strict = request.strict_search,
        "products requested"
    );

    let batches = state.orchestrator.run(request)?;
    Ok(stream_batches(batches))
}
