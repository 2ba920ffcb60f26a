//! MercadoLibre (Colombia) listings.
//!
//! Listing markup comes in two generations (`poly-*` cards and the older
//! `ui-search-*` items), so most fields have a fallback selector. Images
//! below the fold are lazy-loaded: the listing carries a `data:` placeholder
//! and the real image only appears on the product page.

use crate::adapter::{
    absolute_url, child_attr, child_text, encode_query, selector, ExtractedItem, ExtractedPage,
    PageContext, StoreAdapter,
};
use crate::crawler::LimitRule;
use crate::error::ScrapeError;
use crate::price::group_thousands;
use crate::types::{Product, Store};
use scraper::Html;
use std::time::Duration;

/// Listings shown per result page; used to compute page offsets.
const PAGE_SIZE: u32 = 50;

/// MercadoLibre listing scraper.
pub struct MercadoLibreAdapter {
    base_url: String,
}

impl Default for MercadoLibreAdapter {
    fn default() -> Self {
        Self::with_base_url("https://listado.mercadolibre.com.co")
    }
}

impl MercadoLibreAdapter {
    /// Scrape a mirror of MercadoLibre's listing pages served from `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// `"(1.234)"` becomes `"1.234"`.
fn strip_parens(text: &str) -> String {
    text.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
        .to_string()
}

impl StoreAdapter for MercadoLibreAdapter {
    fn store(&self) -> Store {
        Store::MercadoLibre
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        let mut url = format!("{}/{}", self.base_url, encode_query(query, "-"));
        if page > 1 {
            let offset = PAGE_SIZE * (page - 1) + 1;
            url.push_str(&format!("_Desde_{offset}_NoIndex_True"));
        }
        url
    }

    fn extract(&self, html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
        let document = Html::parse_document(html);

        let card_sel = selector("li")?;
        let link_sel = selector("a.poly-component__title")?;
        let name_sel = selector("a.poly-component__title h2")?;
        let count_rated_sel = selector("span.poly-reviews__total")?;
        let picture_sel = selector("img.poly-component__picture")?;
        let price_sel = selector("div.poly-price__current span.andes-money-amount__fraction")?;
        let rating_sel = selector("span.poly-reviews__rating")?;
        let old_price_sel =
            selector("s.andes-money-amount--previous span.andes-money-amount__fraction")?;
        let shipping_sel = selector("div.poly-component__shipping")?;

        let legacy_picture_sel = selector("div.andes-carousel-snapped__slide img")?;
        let legacy_link_sel = selector("a.ui-search-item__group__element")?;
        let legacy_name_sel = selector("a.ui-search-item__group__element h2")?;
        let legacy_price_sel = selector("div.ui-search-price span.andes-money-amount")?;
        let legacy_shipping_sel = selector("p.ui-meliplus-pill span.ui-pb-highlight")?;

        let next_sel = selector(
            "li.andes-pagination__button.andes-pagination__button--next a.andes-pagination__link",
        )?;

        let mut items = Vec::new();
        for card in document.select(&card_sel) {
            let mut picture = child_attr(&card, &picture_sel, "src");
            if picture.is_empty() {
                picture = child_attr(&card, &legacy_picture_sel, "data-src");
            }
            // Pagination buttons and other chrome are `li` too.
            if picture.is_empty() {
                continue;
            }

            let mut link = child_attr(&card, &link_sel, "href");
            if link.is_empty() {
                link = child_attr(&card, &legacy_link_sel, "href");
            }

            let mut name = child_text(&card, &name_sel);
            if name.is_empty() {
                name = child_text(&card, &legacy_name_sel);
            }

            let mut price = child_text(&card, &price_sel);
            if price.is_empty() {
                // aria-label reads like "45900 pesos colombianos".
                price = child_attr(&card, &legacy_price_sel, "aria-label")
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
            }

            let mut free_shipping = child_text(&card, &shipping_sel);
            if free_shipping.is_empty() {
                free_shipping = child_text(&card, &legacy_shipping_sel);
            }

            let product_link = absolute_url(ctx.url, &link).unwrap_or_default();
            let product = Product {
                name,
                price: group_thousands(&price),
                old_price: group_thousands(&child_text(&card, &old_price_sel)),
                picture,
                rating: child_text(&card, &rating_sel),
                count_rated: strip_parens(&child_text(&card, &count_rated_sel)),
                product_link: product_link.clone(),
                free_shipping,
                ..Product::new(Store::MercadoLibre)
            };

            if product.has_placeholder_picture() && !product_link.is_empty() {
                items.push(ExtractedItem::NeedsImage {
                    product,
                    detail_url: product_link,
                });
            } else {
                items.push(ExtractedItem::Ready(product));
            }
        }

        let next_page = document
            .select(&next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| absolute_url(ctx.url, href));

        tracing::debug!(
            count = items.len(),
            has_next = next_page.is_some(),
            "MercadoLibre listings parsed"
        );

        Ok(ExtractedPage { items, next_page })
    }

    fn extract_enriched_image(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let image_sel = selector("img.ui-pdp-image.ui-pdp-gallery__figure__image").ok()?;
        document
            .select(&image_sel)
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty() && !src.starts_with("data:"))
            .map(String::from)
    }

    fn limit_rule(&self) -> LimitRule {
        LimitRule {
            parallelism: 5,
            delay: Duration::from_secs(2),
            random_delay: Duration::from_millis(500),
        }
    }

    fn refetch_budget(&self) -> u32 {
        2
    }
}
