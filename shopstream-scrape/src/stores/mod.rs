//! Storefront adapter implementations.

pub mod alibaba;
pub mod aliexpress;
pub mod amazon;
pub mod mercadolibre;

pub use alibaba::AlibabaAdapter;
pub use aliexpress::AliExpressAdapter;
pub use amazon::AmazonAdapter;
pub use mercadolibre::MercadoLibreAdapter;
