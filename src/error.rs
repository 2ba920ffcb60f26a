//! Error types for the shopstream service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shopstream_scrape::ScrapeError;

/// Reasons a products request is rejected or its stream aborted.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The request body is not valid JSON of the expected shape.
    #[error("malformed request body: {0}")]
    BadRequest(String),

    /// `fastLoad` is outside `1..=10`.
    #[error("fastLoad must be between 1 and 10, got {0}")]
    InvalidSamplingRate(i64),

    /// The scrape could not be started.
    #[error("scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// A batch could not be serialized mid-stream.
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "products request rejected");
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::InvalidSamplingRate(_) | Self::Scrape(ScrapeError::Config(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY.into_response()
            }
            Self::Scrape(_) | Self::Encode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}
