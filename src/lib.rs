//! # shopstream
//!
//! HTTP service that aggregates product listings from several storefronts
//! and streams them to the client in batches while scraping is still in
//! progress. Scraping itself lives in the `shopstream-scrape` crate.

pub mod config;
pub mod error;
pub mod responder;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{ProductsRequest, ShopstreamServer, router, run_server};
