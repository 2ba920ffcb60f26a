//! AliExpress search: products embedded as JSON in a page script.
//!
//! The search page is rendered client-side; the product list ships inside a
//! `window._dida_config_._init_data_=` assignment whose object literal uses
//! one unquoted key (`{ data: ...`). That key is quoted and the first JSON
//! value is decoded, ignoring whatever script follows it.

use crate::adapter::{
    encode_query, https_prefixed, selector, ExtractedItem, ExtractedPage, PageContext, StoreAdapter,
};
use crate::error::ScrapeError;
use crate::price::normalize_formatted;
use crate::types::{Product, Store};
use scraper::Html;
use serde::Deserialize;

const INIT_DATA_MARKER: &str = "window._dida_config_._init_data_=";

/// AliExpress search page scraper.
pub struct AliExpressAdapter {
    base_url: String,
}

impl Default for AliExpressAdapter {
    fn default() -> Self {
        Self::with_base_url("https://aliexpress.com")
    }
}

impl AliExpressAdapter {
    /// Scrape a mirror of AliExpress's search pages served from `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InitData {
    data: InitEnvelope,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InitEnvelope {
    data: PageData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageData {
    root: Root,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Root {
    fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fields {
    mods: Mods,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Mods {
    item_list: ItemList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemList {
    content: Vec<ListItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListItem {
    product_id: String,
    image: ItemImage,
    title: ItemTitle,
    evaluation: Evaluation,
    trade: Trade,
    prices: Prices,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemImage {
    img_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemTitle {
    seo_title: String,
    display_title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Evaluation {
    star_rating: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Trade {
    trade_desc: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Prices {
    original_price: FormattedPrice,
    sale_price: FormattedPrice,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FormattedPrice {
    formatted_price: String,
}

/// Decode the init-data object that follows the marker in `script`.
fn parse_init_data(script: &str) -> Result<Vec<ListItem>, ScrapeError> {
    let (_, rest) = script
        .split_once(INIT_DATA_MARKER)
        .ok_or_else(|| ScrapeError::Parse("AliExpress init data marker missing".into()))?;
    let json = rest.trim().replacen("{ data:", r#"{"data":"#, 1);

    let init: InitData = serde_json::Deserializer::from_str(&json)
        .into_iter()
        .next()
        .ok_or_else(|| ScrapeError::Parse("AliExpress init data empty".into()))?
        .map_err(|e| ScrapeError::Parse(format!("AliExpress init data: {e}")))?;

    Ok(init.data.data.root.fields.mods.item_list.content)
}

fn to_product(item: ListItem) -> Product {
    let name = if item.title.seo_title.is_empty() {
        item.title.display_title
    } else {
        item.title.seo_title
    };

    let sale = normalize_formatted(&item.prices.sale_price.formatted_price);
    let original = normalize_formatted(&item.prices.original_price.formatted_price);
    let (price, old_price) = if sale.is_empty() {
        (original, String::new())
    } else if sale == original {
        (sale, String::new())
    } else {
        (sale, original)
    };

    let rating = if item.evaluation.star_rating > 0.0 {
        format!("{:.1}", item.evaluation.star_rating)
    } else {
        String::new()
    };

    Product {
        name,
        price,
        old_price,
        picture: if item.image.img_url.is_empty() {
            String::new()
        } else {
            https_prefixed(&item.image.img_url)
        },
        rating,
        count_sold: item
            .trade
            .trade_desc
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        product_link: if item.product_id.is_empty() {
            String::new()
        } else {
            format!("https://www.aliexpress.com/item/{}.html", item.product_id)
        },
        ..Product::new(Store::AliExpress)
    }
}

impl StoreAdapter for AliExpressAdapter {
    fn store(&self) -> Store {
        Store::AliExpress
    }

    fn search_url(&self, query: &str, page: u32) -> String {
        let mut url = format!("{}/w/wholesale-{}.html", self.base_url, encode_query(query, "-"));
        if page > 1 {
            url.push_str(&format!("?page={page}"));
        }
        url
    }

    fn extract(&self, html: &str, ctx: &PageContext<'_>) -> Result<ExtractedPage, ScrapeError> {
        let document = Html::parse_document(html);
        let script_sel = selector("script")?;

        let mut items = Vec::new();
        for script in document.select(&script_sel) {
            let text: String = script.text().collect();
            if !text.contains(INIT_DATA_MARKER) {
                continue;
            }
            match parse_init_data(&text) {
                Ok(list) => {
                    items.extend(list.into_iter().map(|i| ExtractedItem::Ready(to_product(i))));
                }
                Err(err) => {
                    tracing::warn!(page = ctx.page, error = %err, "AliExpress product data unreadable");
                }
            }
        }

        tracing::debug!(count = items.len(), page = ctx.page, "AliExpress products parsed");

        Ok(ExtractedPage {
            items,
            next_page: Some(self.search_url(ctx.query, ctx.page + 1)),
        })
    }

    fn refetch_budget(&self) -> u32 {
        2
    }
}
