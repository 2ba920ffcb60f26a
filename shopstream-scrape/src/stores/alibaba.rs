//! Alibaba wholesale search: server-rendered product cards.
//!
//! Card titles carry no clean text, so the product name is recovered from
//! the slug of the product-detail link. Pagination is templated: every page
//! reports a next page until the run's page budget is spent.

use crate::adapter::{
    child_attr, child_text, encode_query, https_prefixed, selector, ExtractedItem, ExtractedPage,
    PageContext, StoreAdapter,
};
use crate::error::ScrapeError;
use crate::types::{Product, Store};
use scraper::Html;

/// Alibaba search page scraper.
pub struct AlibabaAdapter {
    base_url: String,
}

impl Default for AlibabaAdapter {
    fn default() -> Self {
        Self::with_base_url("https://www.alibaba.com")
    }
}

impl AlibabaAdapter {
    /// Scrape a mirror of Alibaba's search pages served from `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derive a readable name from a product-detail link.
    ///
    /// `//www.alibaba.com/product-detail/Wooden-Watch-Men_1600.html`
    /// yields `Wooden Watch Men`.
    fn name_from_link(href: &str) -> String {
        let slug = href
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default();
        let slug = slug.split('_').next().unwrap_or_default();
        slug.trim_end_matches(".html").replace('-', " ").trim().to_string()
    }
}

impl StoreAdapter for AlibabaAdapter {
    fn store(&self) -> Store {
        Store::Alibaba
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        let mut url = format!(
            "{}/trade/search?tab=all&SearchText={}",
            self.base_url,
            encode_query(query, "+")
        );
        if page > 1 {
            url.push_str(&format!("&page={page}"));
        }
        url
    }

    fn extract(&self, html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
        let document = Html::parse_document(html);

        let card_sel = selector("div.organic-list div.fy23-search-card")?;
        let title_sel = selector("h2.search-card-e-title a")?;
        let price_sel = selector("div.search-card-e-price-main")?;
        let picture_sel = selector("div.search-card-e-slider__wrapper img")?;
        let rating_sel = selector("span.search-card-e-review strong")?;
        let count_rated_sel = selector("span.search-card-e-review span")?;
        let old_price_sel =
            selector("div.search-card-e-price__list span.search-card-e-price__original")?;

        let mut items = Vec::new();
        for card in document.select(&card_sel) {
            let href = child_attr(&card, &title_sel, "href");
            let picture = child_attr(&card, &picture_sel, "src");

            let product = Product {
                name: Self::name_from_link(&href),
                price: child_text(&card, &price_sel),
                old_price: child_text(&card, &old_price_sel),
                picture: if picture.is_empty() {
                    picture
                } else {
                    https_prefixed(&picture)
                },
                rating: child_text(&card, &rating_sel),
                count_rated: child_text(&card, &count_rated_sel),
                product_link: if href.is_empty() {
                    href
                } else {
                    https_prefixed(&href)
                },
                ..Product::new(Store::Alibaba)
            };
            items.push(ExtractedItem::Ready(product));
        }

        tracing::debug!(count = items.len(), page = ctx.page, "Alibaba cards parsed");

        Ok(ExtractedPage {
            items,
            next_page: Some(self.search_url(ctx.query, ctx.page + 1)),
        })
    }

    fn refetch_budget(&self) -> u32 {
        4
    }
}
