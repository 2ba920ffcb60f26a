//! End-to-end orchestrator runs against mock storefronts.

use futures::StreamExt;
use shopstream_scrape::stores::{AlibabaAdapter, AmazonAdapter, MercadoLibreAdapter};
use shopstream_scrape::{
    BatchedPage, LimitRule, Orchestrator, ScrapeConfig, ScrapeRequest, Store,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> ScrapeConfig {
    ScrapeConfig {
        source_timeout_seconds: 5,
        user_agent: Some("ShopstreamTest/1.0".into()),
        limit_override: Some(LimitRule::unthrottled()),
        ..Default::default()
    }
}

fn alibaba_page(count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            format!(
                r#"<div class="fy23-search-card">
  <h2 class="search-card-e-title"><a href="//www.alibaba.com/product-detail/Wood-Watch-Model-{i}_{i}.html">x</a></h2>
  <div class="search-card-e-slider__wrapper"><img src="//s.alicdn.com/{i}.jpg"></div>
  <div class="search-card-e-price-main">${i}.00</div>
</div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="organic-list">{cards}</div></body></html>"#)
}

fn amazon_page(count: usize) -> String {
    let cards: String = (0..count)
        .map(|i| {
            format!(
                r#"<div data-component-type="s-search-result">
  <div class="s-product-image-container"><a href="/Watch-{i}/dp/B{i}"><img class="s-image" src="https://m.media-amazon.com/{i}.jpg"></a></div>
  <h2><span>Amazon Watch {i}</span></h2>
  <span class="a-price"><span class="a-price-whole">{i}.</span><span class="a-price-fraction">99</span></span>
</div>"#
            )
        })
        .collect();
    format!("<html><body>{cards}</body></html>")
}

async fn mount_page(server: &MockServer, page_path: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn collect(orchestrator: &Orchestrator, request: ScrapeRequest) -> Vec<BatchedPage> {
    orchestrator
        .run(request)
        .expect("valid request")
        .collect()
        .await
}

#[tokio::test]
async fn alibaba_twelve_items_stream_as_ten_then_two() {
    let server = MockServer::start().await;
    mount_page(&server, "/trade/search", alibaba_page(12), Duration::ZERO).await;

    let orchestrator = Orchestrator::new(test_config())
        .expect("valid config")
        .with_adapter(Arc::new(AlibabaAdapter::with_base_url(server.uri())));
    let request = ScrapeRequest::new("watch wood").with_stores([Store::Alibaba]);
    let batches = collect(&orchestrator, request).await;

    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 2]);

    let products: Vec<_> = batches.iter().flatten().collect();
    assert!(products.iter().all(|p| p.store == "alibaba"));
    let names: HashSet<_> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names.len(), 12, "no duplicates");
    assert_eq!(products[0].name, "Wood Watch Model 0");
    assert_eq!(products[0].picture, "https://s.alicdn.com/0.jpg");
}

#[tokio::test]
async fn slow_storefront_times_out_without_blocking_others() {
    let alibaba = MockServer::start().await;
    mount_page(&alibaba, "/trade/search", alibaba_page(12), Duration::ZERO).await;
    let amazon = MockServer::start().await;
    mount_page(&amazon, "/s", amazon_page(3), Duration::from_secs(5)).await;

    let config = ScrapeConfig {
        source_timeout_seconds: 1,
        ..test_config()
    };
    let orchestrator = Orchestrator::new(config)
        .expect("valid config")
        .with_adapter(Arc::new(AlibabaAdapter::with_base_url(alibaba.uri())))
        .with_adapter(Arc::new(AmazonAdapter::with_base_url(amazon.uri())));
    let request =
        ScrapeRequest::new("watch wood").with_stores([Store::Alibaba, Store::Amazon]);

    let started = Instant::now();
    let batches = collect(&orchestrator, request).await;

    assert!(
        started.elapsed() < Duration::from_secs(4),
        "stream must close at the source timeout"
    );
    let products: Vec<_> = batches.iter().flatten().collect();
    assert_eq!(products.len(), 12);
    assert!(products.iter().all(|p| p.store == "alibaba"));
}

#[tokio::test]
async fn sources_interleave_but_keep_their_own_order() {
    let alibaba = MockServer::start().await;
    mount_page(&alibaba, "/trade/search", alibaba_page(12), Duration::ZERO).await;
    let amazon = MockServer::start().await;
    mount_page(&amazon, "/s", amazon_page(3), Duration::from_millis(50)).await;

    let orchestrator = Orchestrator::new(test_config())
        .expect("valid config")
        .with_adapter(Arc::new(AlibabaAdapter::with_base_url(alibaba.uri())))
        .with_adapter(Arc::new(AmazonAdapter::with_base_url(amazon.uri())));
    let request =
        ScrapeRequest::new("watch wood").with_stores([Store::Amazon, Store::Alibaba]);
    let batches = collect(&orchestrator, request).await;

    for batch in &batches {
        let stores: HashSet<_> = batch.iter().map(|p| p.store.as_str()).collect();
        assert_eq!(stores.len(), 1, "a batch never mixes storefronts");
    }

    let alibaba_sizes: Vec<usize> = batches
        .iter()
        .filter(|b| b[0].store == "alibaba")
        .map(Vec::len)
        .collect();
    assert_eq!(alibaba_sizes, vec![10, 2]);

    let amazon_names: Vec<_> = batches
        .iter()
        .flatten()
        .filter(|p| p.store == "amazon")
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(amazon_names, vec!["Amazon Watch 0", "Amazon Watch 1", "Amazon Watch 2"]);
}

#[tokio::test]
async fn low_yield_page_is_refetched_once_without_duplicates() {
    let server = MockServer::start().await;
    mount_page(&server, "/trade/search", alibaba_page(2), Duration::ZERO).await;

    let orchestrator = Orchestrator::new(test_config())
        .expect("valid config")
        .with_adapter(Arc::new(AlibabaAdapter::with_base_url(server.uri())));
    let request = ScrapeRequest::new("watch wood").with_stores([Store::Alibaba]);
    let batches = collect(&orchestrator, request).await;

    let products: Vec<_> = batches.iter().flatten().collect();
    assert_eq!(products.len(), 2);

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2, "original visit plus one re-fetch");
}

#[tokio::test]
async fn mercadolibre_placeholders_enriched_from_product_page() {
    let server = MockServer::start().await;
    let listing = format!(
        r#"<html><body><ol>
<li><img class="poly-component__picture" src="data:image/gif;base64,R0lGOD">
  <a class="poly-component__title" href="{base}/MCO-1"><h2>Reloj Madera</h2></a>
  <div class="poly-price__current"><span class="andes-money-amount__fraction">89900</span></div></li>
</ol></body></html>"#,
        base = server.uri()
    );
    mount_page(&server, "/reloj-madera", listing, Duration::ZERO).await;
    mount_page(
        &server,
        "/MCO-1",
        r#"<img class="ui-pdp-image ui-pdp-gallery__figure__image" src="https://http2.mlstatic.com/full.webp">"#
            .to_string(),
        Duration::ZERO,
    )
    .await;

    let orchestrator = Orchestrator::new(test_config())
        .expect("valid config")
        .with_adapter(Arc::new(MercadoLibreAdapter::with_base_url(server.uri())))
        .with_sampling_seed(7);
    let request = ScrapeRequest {
        sampling_rate: 1,
        strict_search: true,
        ..ScrapeRequest::new("reloj madera").with_stores([Store::MercadoLibre])
    };
    let batches = collect(&orchestrator, request).await;

    let products: Vec<_> = batches.iter().flatten().collect();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].picture, "https://http2.mlstatic.com/full.webp");
    assert_eq!(products[0].price, "89.900");
}

#[tokio::test]
async fn failing_storefront_yields_nothing_and_closes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let orchestrator = Orchestrator::new(test_config())
        .expect("valid config")
        .with_adapter(Arc::new(AlibabaAdapter::with_base_url(server.uri())));
    let request = ScrapeRequest::new("watch wood").with_stores([Store::Alibaba]);
    let batches = collect(&orchestrator, request).await;

    assert!(batches.is_empty());
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 3, "three attempts, then give up");
}

#[tokio::test]
#[ignore] // Requires network access
async fn live_alibaba_search() {
    let orchestrator = Orchestrator::new(ScrapeConfig::default()).expect("valid config");
    let request = ScrapeRequest::new("watch wood").with_stores([Store::Alibaba]);
    let batches = collect(&orchestrator, request).await;
    for product in batches.iter().flatten() {
        println!("{} | {} | {}", product.name, product.price, product.product_link);
    }
}
