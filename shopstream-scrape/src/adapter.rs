//! Trait definition for pluggable storefront adapters.
//!
//! Each storefront (AliExpress, Amazon, Alibaba, MercadoLibre) implements
//! [`StoreAdapter`] to describe how its search pages are addressed and
//! parsed. The crawl driver in [`crate::crawl`] owns everything else:
//! fetching, sampling, batching, deduplication and pagination.

use crate::crawler::LimitRule;
use crate::error::ScrapeError;
use crate::stores::{AlibabaAdapter, AliExpressAdapter, AmazonAdapter, MercadoLibreAdapter};
use crate::types::{Product, Store};
use scraper::{ElementRef, Selector};
use std::sync::Arc;

/// What an adapter knows about the page it is parsing.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// URL the page was fetched from; relative links resolve against it.
    pub url: &'a str,
    /// Search query of the running request.
    pub query: &'a str,
    /// Logical result page number (1-based).
    pub page: u32,
}

/// One product candidate found on a search page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedItem {
    /// The product is complete as extracted.
    Ready(Product),
    /// The product's picture is a lazy-load placeholder; the real image
    /// lives on `detail_url`.
    NeedsImage {
        /// Product with the placeholder picture.
        product: Product,
        /// Product page holding the real image.
        detail_url: String,
    },
}

/// Everything an adapter extracted from one search page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Product candidates in page order.
    pub items: Vec<ExtractedItem>,
    /// Next result page, if the storefront reports one.
    pub next_page: Option<String>,
}

/// A pluggable storefront backend.
///
/// Implementors describe one storefront's search URLs, markup and pacing.
/// Parsing is synchronous and works on an owned HTML string, so no parser
/// state is ever held across an await point.
///
/// All implementations must be `Send + Sync` for concurrent storefront runs.
pub trait StoreAdapter: Send + Sync {
    /// Returns which [`Store`] this adapter scrapes.
    fn store(&self) -> Store;

    /// Build the search URL for `query` on result page `page` (1-based).
    fn search_url(&self, query: &str, page: u32) -> String;

    /// Parse one search page into product candidates and a next-page link.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the page cannot be interpreted at
    /// all. Individual malformed items are skipped instead.
    fn extract(&self, html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError>;

    /// Pull the real image URL out of a product detail page.
    ///
    /// Only storefronts that lazy-load listing images need this.
    fn extract_enriched_image(&self, html: &str) -> Option<String> {
        let _ = html;
        None
    }

    /// Request pacing for this storefront.
    fn limit_rule(&self) -> LimitRule {
        LimitRule::default()
    }

    /// How many low-yield pages may be re-fetched during one run.
    fn refetch_budget(&self) -> u32 {
        1
    }
}

/// The production adapter for `store`.
pub fn default_adapter(store: Store) -> Arc<dyn StoreAdapter> {
    match store {
        Store::AliExpress => Arc::new(AliExpressAdapter::default()),
        Store::Amazon => Arc::new(AmazonAdapter::default()),
        Store::Alibaba => Arc::new(AlibabaAdapter::default()),
        Store::MercadoLibre => Arc::new(MercadoLibreAdapter::default()),
    }
}

/// Parse a CSS selector, naming it in the error.
pub(crate) fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Parse(format!("invalid selector {css:?}: {e:?}")))
}

/// Concatenated, trimmed text of every descendant matching `sel`.
pub(crate) fn child_text(element: &ElementRef<'_>, sel: &Selector) -> String {
    element
        .select(sel)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Attribute `attr` of the first descendant matching `sel`, or empty.
pub(crate) fn child_attr(element: &ElementRef<'_>, sel: &Selector, attr: &str) -> String {
    element
        .select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Percent-encode each query word and join the words with `sep`.
///
/// Words are encoded as `application/x-www-form-urlencoded`, so `#`, `&`,
/// `?`, `/` and `+` inside a word never act as URL syntax. The result is
/// safe both as a query value and as a single path segment.
pub(crate) fn encode_query(query: &str, sep: &str) -> String {
    query
        .split_whitespace()
        .map(|word| url::form_urlencoded::byte_serialize(word.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Prefix protocol-relative URLs with `https:`.
pub(crate) fn https_prefixed(href: &str) -> String {
    if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    }
}

/// Resolve a possibly relative or protocol-relative `href` against `base`.
pub(crate) fn absolute_url(base: &str, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    let base = url::Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    /// A minimal adapter for exercising trait defaults.
    struct MockAdapter;

    impl StoreAdapter for MockAdapter {
        fn store(&self) -> Store {
            Store::Amazon
        }

        fn search_url(&self, query: &str, page: u32) -> String {
            format!("https://mock.test/s?q={}&p={page}", encode_query(query, "+"))
        }

        fn extract(
            &self,
            _html: &str,
            _ctx: &PageContext<'_>,
        ) -> Result<ExtractedPage, ScrapeError> {
            Ok(ExtractedPage::default())
        }
    }

    #[test]
    fn mock_adapter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockAdapter>();
    }

    #[test]
    fn trait_defaults() {
        let adapter = MockAdapter;
        assert_eq!(adapter.limit_rule(), LimitRule::default());
        assert_eq!(adapter.refetch_budget(), 1);
        assert!(adapter.extract_enriched_image("<img src=x>").is_none());
        assert_eq!(
            adapter.search_url("watch  wood", 2),
            "https://mock.test/s?q=watch+wood&p=2"
        );
    }

    #[test]
    fn default_adapter_matches_store() {
        for store in Store::all() {
            assert_eq!(default_adapter(*store).store(), *store);
        }
    }

    #[test]
    fn child_helpers_read_text_and_attributes() {
        let html = Html::parse_fragment(
            r#"<div class="card"><a class="t" href="/item/1"><span>Wood</span> <span>Watch</span></a></div>"#,
        );
        let card_sel = selector("div.card").expect("selector");
        let link_sel = selector("a.t").expect("selector");
        let span_sel = selector("a.t span").expect("selector");
        let card = html.select(&card_sel).next().expect("card");

        assert_eq!(child_attr(&card, &link_sel, "href"), "/item/1");
        assert_eq!(child_text(&card, &span_sel), "WoodWatch");
        assert_eq!(child_attr(&card, &link_sel, "missing"), "");
    }

    #[test]
    fn invalid_selector_is_parse_error() {
        let err = selector("div[").unwrap_err();
        assert!(err.to_string().contains("invalid selector"));
    }

    #[test]
    fn query_words_are_percent_encoded() {
        assert_eq!(encode_query("usb #2 & cable", "+"), "usb+%232+%26+cable");
        assert_eq!(encode_query("funda 1/2", "-"), "funda-1%2F2");
        assert_eq!(encode_query("c++ ?", "+"), "c%2B%2B+%3F");
        assert_eq!(encode_query("niño", "-"), "ni%C3%B1o");
        assert_eq!(encode_query("   ", "+"), "");
    }

    #[test]
    fn absolute_url_resolves_relative_links() {
        assert_eq!(
            absolute_url("https://www.amazon.com/s?k=a", "/s?k=a&page=2").as_deref(),
            Some("https://www.amazon.com/s?k=a&page=2")
        );
        assert_eq!(
            absolute_url("https://www.alibaba.com/x", "//s.alicdn.com/img.jpg").as_deref(),
            Some("https://s.alicdn.com/img.jpg")
        );
        assert!(absolute_url("https://x.test", "").is_none());
    }
}
