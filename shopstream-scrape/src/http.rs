//! Per-storefront HTTP clients.
//!
//! Every storefront run builds its own [`reqwest::Client`], so sources never
//! share a connection pool, a cookie jar or a browser identity. Requests
//! carry the headers a desktop browser sends for a search page, in the
//! language of the storefront's market.

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::types::Store;
use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, UPGRADE_INSECURE_REQUESTS,
};
use std::time::Duration;

/// Desktop browser identities. Storefronts only serve full result markup to
/// desktop clients; mobile agents get app-install interstitials.
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// `Accept-Language` for the storefront's market.
pub fn accept_language(store: Store) -> &'static str {
    match store {
        Store::MercadoLibre => "es-CO,es;q=0.9,en;q=0.5",
        Store::AliExpress | Store::Amazon | Store::Alibaba => "en-US,en;q=0.9",
    }
}

fn default_headers(store: Store) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(accept_language(store)));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Build the HTTP client for one run against `store`.
///
/// Cookies persist for the life of the client, which is one storefront run:
/// search pages and the detail pages visited for image enrichment share a
/// session, as they would in a browser tab.
///
/// # Errors
///
/// Returns [`ScrapeError::Http`] if the client cannot be constructed.
pub fn build_client(store: Store, config: &ScrapeConfig) -> Result<reqwest::Client, ScrapeError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_owned());

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .user_agent(ua)
        .default_headers(default_headers(store))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ScrapeError::Http(format!("failed to build {store} client: {e}")))
}

/// Pick a desktop User-Agent at random.
pub fn random_user_agent() -> &'static str {
    DESKTOP_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}
