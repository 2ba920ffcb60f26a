//! Secondary fetches that resolve lazy-loaded product images.

use crate::adapter::StoreAdapter;
use crate::crawler::PageFetcher;
use crate::error::ScrapeError;
use crate::types::Product;

/// Load `detail_url` and read the product's real image from it.
///
/// # Errors
///
/// Returns [`ScrapeError::Http`] if the page cannot be fetched, or
/// [`ScrapeError::Parse`] if it holds no usable image.
pub async fn fetch_image<F: PageFetcher>(
    fetcher: &F,
    adapter: &dyn StoreAdapter,
    detail_url: &str,
) -> Result<String, ScrapeError> {
    let html = fetcher.fetch(detail_url).await?;
    adapter
        .extract_enriched_image(&html)
        .ok_or_else(|| ScrapeError::Parse(format!("no product image on {detail_url}")))
}

/// Replace `product`'s placeholder picture with the one on `detail_url`.
///
/// When the image cannot be resolved the product keeps its placeholder,
/// unless `strict` is set, in which case it is dropped.
pub async fn enrich_product<F: PageFetcher>(
    fetcher: &F,
    adapter: &dyn StoreAdapter,
    mut product: Product,
    detail_url: &str,
    strict: bool,
) -> Option<Product> {
    match fetch_image(fetcher, adapter, detail_url).await {
        Ok(picture) => {
            product.picture = picture;
            Some(product)
        }
        Err(err) if strict => {
            tracing::debug!(name = %product.name, error = %err, "enrichment failed, product dropped");
            None
        }
        Err(err) => {
            tracing::debug!(name = %product.name, error = %err, "enrichment failed, keeping placeholder");
            Some(product)
        }
    }
}
