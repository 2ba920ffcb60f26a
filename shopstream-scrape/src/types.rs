//! Core types: products, storefront identification and scrape requests.

use crate::error::ScrapeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A group of products flushed together by one storefront.
///
/// Every batch except the last one a storefront emits holds exactly
/// [`ScrapeConfig::batch_size`](crate::ScrapeConfig::batch_size) products.
pub type BatchedPage = Vec<Product>;

/// A normalised product listing returned to the caller.
///
/// Every field is a string; an empty string means the storefront did not
/// provide the value. Field formats (currency, decimal separators) are
/// source-specific.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Product title.
    pub name: String,
    /// Current price as a normalised decimal string.
    pub price: String,
    /// Original (pre-discount) price.
    pub old_price: String,
    /// Image URL, or a lazy-load placeholder when enrichment was skipped.
    pub picture: String,
    /// Number of units sold, as reported by the storefront.
    pub count_sold: String,
    /// Number of ratings, as reported by the storefront.
    pub count_rated: String,
    /// Link to the product page.
    pub product_link: String,
    /// Average rating.
    pub rating: String,
    /// Wire name of the storefront this product came from.
    pub store: String,
    /// Free-shipping label, if any.
    pub free_shipping: String,
}

impl Product {
    /// Create an empty product tagged with `store`.
    pub fn new(store: Store) -> Self {
        Self {
            store: store.name().to_owned(),
            ..Default::default()
        }
    }

    /// Whether this product may be emitted.
    ///
    /// A product needs at least one non-blank field besides its link and
    /// store, and must not be missing both its name and its picture.
    pub fn is_valid(&self) -> bool {
        let has_content = [
            &self.name,
            &self.price,
            &self.old_price,
            &self.picture,
            &self.count_sold,
            &self.count_rated,
            &self.rating,
            &self.free_shipping,
        ]
        .iter()
        .any(|field| !field.trim().is_empty());

        has_content && !(self.name.trim().is_empty() && self.picture.trim().is_empty())
    }

    /// Whether the picture is a lazy-load placeholder rather than a real URL.
    pub fn has_placeholder_picture(&self) -> bool {
        self.picture.starts_with("data:")
    }
}

/// Storefronts that shopstream can scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Store {
    /// AliExpress: products come from JSON embedded in the search page.
    AliExpress,
    /// Amazon (US storefront).
    Amazon,
    /// Alibaba wholesale search.
    Alibaba,
    /// MercadoLibre (Colombia), lazy-loads some images.
    MercadoLibre,
}

impl Store {
    /// Returns the wire name of this storefront.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AliExpress => "aliexpress",
            Self::Amazon => "amazon",
            Self::Alibaba => "alibaba",
            Self::MercadoLibre => "mercadolibre",
        }
    }

    /// Returns all storefronts, in the default request order.
    pub fn all() -> &'static [Store] {
        &[
            Self::AliExpress,
            Self::Amazon,
            Self::Alibaba,
            Self::MercadoLibre,
        ]
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Store {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|store| store.name() == wanted)
            .ok_or_else(|| ScrapeError::Config(format!("unknown store: {s}")))
    }
}

/// Lowest accepted sampling rate (always enrich).
pub const MIN_SAMPLING_RATE: u8 = 1;
/// Highest accepted sampling rate (enrich one item in ten).
pub const MAX_SAMPLING_RATE: u8 = 10;

/// Parameters for one aggregated product search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    /// Free-text search query.
    pub query: String,
    /// Storefronts to scrape, in request order without duplicates.
    pub stores: Vec<Store>,
    /// Maximum number of result pages visited per storefront.
    pub max_pages: u32,
    /// First result page to visit (1-based).
    pub start_page: u32,
    /// Inverse probability of enriching an item that needs it, in `1..=10`.
    pub sampling_rate: u8,
    /// Drop incomplete or approximate items instead of emitting them.
    pub strict_search: bool,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            stores: Store::all().to_vec(),
            max_pages: 1,
            start_page: 1,
            sampling_rate: MAX_SAMPLING_RATE,
            strict_search: false,
        }
    }
}

impl ScrapeRequest {
    /// Create a request for `query` against every storefront.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Restrict the request to `stores`, keeping first-seen order and
    /// dropping repeats.
    pub fn with_stores(mut self, stores: impl IntoIterator<Item = Store>) -> Self {
        let mut ordered = Vec::new();
        for store in stores {
            if !ordered.contains(&store) {
                ordered.push(store);
            }
        }
        self.stores = ordered;
        self
    }

    /// Validates the request, returning an error if any field is out of range.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&self.sampling_rate) {
            return Err(ScrapeError::Config(format!(
                "sampling rate must be between {MIN_SAMPLING_RATE} and {MAX_SAMPLING_RATE}, got {}",
                self.sampling_rate
            )));
        }
        if self.max_pages == 0 {
            return Err(ScrapeError::Config(
                "max_pages must be greater than 0".into(),
            ));
        }
        if self.start_page == 0 {
            return Err(ScrapeError::Config(
                "start_page must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Product {
        Product {
            name: name.into(),
            ..Product::new(Store::Amazon)
        }
    }

    #[test]
    fn new_product_is_tagged_with_store() {
        let product = Product::new(Store::MercadoLibre);
        assert_eq!(product.store, "mercadolibre");
        assert!(product.name.is_empty());
    }

    #[test]
    fn empty_product_is_invalid() {
        assert!(!Product::new(Store::Alibaba).is_valid());
    }

    #[test]
    fn link_only_product_is_invalid() {
        let product = Product {
            product_link: "https://example.com/item".into(),
            ..Product::new(Store::Alibaba)
        };
        assert!(!product.is_valid());
    }

    #[test]
    fn price_without_name_or_picture_is_invalid() {
        let product = Product {
            price: "12.99".into(),
            ..Product::new(Store::Amazon)
        };
        assert!(!product.is_valid());
    }

    #[test]
    fn picture_without_name_is_valid() {
        let product = Product {
            picture: "https://img.example.com/a.jpg".into(),
            ..Product::new(Store::Amazon)
        };
        assert!(product.is_valid());
    }

    #[test]
    fn whitespace_fields_count_as_empty() {
        let product = Product {
            name: "   ".into(),
            picture: " ".into(),
            price: "10".into(),
            ..Product::new(Store::Amazon)
        };
        assert!(!product.is_valid());
        assert!(named("Wood watch").is_valid());
    }

    #[test]
    fn placeholder_picture_detected() {
        let mut product = named("Wood watch");
        product.picture = "data:image/gif;base64,R0lGOD".into();
        assert!(product.has_placeholder_picture());
        product.picture = "https://http2.mlstatic.com/a.webp".into();
        assert!(!product.has_placeholder_picture());
    }

    #[test]
    fn product_serializes_with_snake_case_keys() {
        let json = serde_json::to_value(named("Wood watch")).expect("serialize");
        for key in [
            "name",
            "price",
            "old_price",
            "picture",
            "count_sold",
            "count_rated",
            "product_link",
            "rating",
            "store",
            "free_shipping",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["store"], "amazon");
    }

    #[test]
    fn store_parses_case_insensitively() {
        assert_eq!("Alibaba".parse::<Store>().expect("parse"), Store::Alibaba);
        assert_eq!(
            " mercadolibre ".parse::<Store>().expect("parse"),
            Store::MercadoLibre
        );
        assert!("ebay".parse::<Store>().is_err());
    }

    #[test]
    fn store_display_matches_wire_name() {
        for store in Store::all() {
            assert_eq!(store.to_string(), store.name());
            let json = serde_json::to_string(store).expect("serialize");
            assert_eq!(json, format!("\"{}\"", store.name()));
        }
    }

    #[test]
    fn default_request_targets_all_stores() {
        let request = ScrapeRequest::default();
        assert_eq!(request.stores.len(), 4);
        assert_eq!(request.max_pages, 1);
        assert_eq!(request.start_page, 1);
        assert_eq!(request.sampling_rate, 10);
        assert!(!request.strict_search);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn with_stores_removes_repeats_and_keeps_order() {
        let request = ScrapeRequest::new("watch wood").with_stores([
            Store::MercadoLibre,
            Store::Amazon,
            Store::MercadoLibre,
        ]);
        assert_eq!(request.stores, vec![Store::MercadoLibre, Store::Amazon]);
    }

    #[test]
    fn sampling_rate_out_of_range_rejected() {
        for rate in [0, 11] {
            let request = ScrapeRequest {
                sampling_rate: rate,
                ..Default::default()
            };
            let err = request.validate().unwrap_err();
            assert!(err.to_string().contains("sampling rate"));
        }
    }

    #[test]
    fn zero_pages_rejected() {
        let request = ScrapeRequest {
            max_pages: 0,
            ..Default::default()
        };
        assert!(request.validate().unwrap_err().to_string().contains("max_pages"));

        let request = ScrapeRequest {
            start_page: 0,
            ..Default::default()
        };
        assert!(request.validate().unwrap_err().to_string().contains("start_page"));
    }
}
