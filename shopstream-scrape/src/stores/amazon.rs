//! Amazon search: server-rendered result cards with a "next" link.

use crate::adapter::{
    absolute_url, child_attr, child_text, encode_query, selector, ExtractedItem, ExtractedPage,
    PageContext, StoreAdapter,
};
use crate::error::ScrapeError;
use crate::price::first_dollar_amount;
use crate::types::{Product, Store};
use scraper::Html;

/// Prices this long are concatenations of several offers, not one price.
const MAX_PRICE_LEN: usize = 18;

/// Amazon search page scraper.
pub struct AmazonAdapter {
    base_url: String,
}

impl Default for AmazonAdapter {
    fn default() -> Self {
        Self::with_base_url("https://www.amazon.com")
    }
}

impl AmazonAdapter {
    /// Scrape a mirror of Amazon's search pages served from `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Name fallback: the slug before `/dp/` in a product link.
    fn name_from_link(href: &str) -> String {
        href.trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
            .replace('-', " ")
    }
}

impl StoreAdapter for AmazonAdapter {
    fn store(&self) -> Store {
        Store::Amazon
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        let mut url = format!("{}/s?k={}", self.base_url, encode_query(query, "+"));
        if page > 1 {
            url.push_str(&format!("&page={page}"));
        }
        url
    }

    fn extract(&self, html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
        let document = Html::parse_document(html);

        let card_sel = selector(r#"div[data-component-type="s-search-result"]"#)?;
        let link_sel = selector("div.s-product-image-container a")?;
        let name_sel = selector("h2 span")?;
        let whole_sel = selector("span.a-price-whole")?;
        let fraction_sel = selector("span.a-price-fraction")?;
        let picture_sel = selector("img.s-image")?;
        let rating_sel = selector("i span.a-icon-alt")?;
        let count_rated_sel = selector(r#"a[href*="customerReviews"] span"#)?;
        let old_price_sel = selector("span.a-price.a-text-price")?;
        let next_sel = selector("a.s-pagination-next")?;

        let mut items = Vec::new();
        for card in document.select(&card_sel) {
            let href = child_attr(&card, &link_sel, "href");

            let mut name = child_text(&card, &name_sel);
            if name.is_empty() && !href.is_empty() {
                name = Self::name_from_link(&href);
            }
            if name.is_empty() {
                continue;
            }

            let price = format!(
                "{}{}",
                child_text(&card, &whole_sel),
                child_text(&card, &fraction_sel)
            );
            if price.is_empty() || price.len() >= MAX_PRICE_LEN {
                tracing::debug!(name, price, "Amazon card without a single price skipped");
                continue;
            }

            let rating = child_text(&card, &rating_sel)
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();

            let product = Product {
                name,
                price,
                old_price: first_dollar_amount(&child_text(&card, &old_price_sel)),
                picture: child_attr(&card, &picture_sel, "src"),
                rating,
                count_rated: child_text(&card, &count_rated_sel),
                product_link: absolute_url(ctx.url, &href).unwrap_or_default(),
                ..Product::new(Store::Amazon)
            };
            items.push(ExtractedItem::Ready(product));
        }

        let next_page = document
            .select(&next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolute_url(ctx.url, href));

        tracing::debug!(count = items.len(), has_next = next_page.is_some(), "Amazon results parsed");

        Ok(ExtractedPage { items, next_page })
    }
}
