//! Streams product batches to the client as they arrive.
//!
//! Each batch is written as one independently encoded JSON array followed by
//! a newline, in its own body chunk, so clients can parse results while the
//! scrape is still running. The response ends when the batch stream ends.

use crate::error::ServerError;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use shopstream_scrape::BatchedPage;

/// Encode one batch as a newline-terminated JSON array.
///
/// # Errors
///
/// Returns [`ServerError::Encode`] if the batch cannot be serialized.
pub fn encode_batch(batch: &BatchedPage) -> Result<Bytes, ServerError> {
    let mut buf = serde_json::to_vec(batch)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Build a `200 application/json` response that writes every batch from
/// `batches` as soon as it is produced.
///
/// A batch that fails to encode ends the body with an error, which aborts
/// the response on the wire.
pub fn stream_batches<S>(batches: S) -> Response
where
    S: Stream<Item = BatchedPage> + Send + 'static,
{
    let body = async_stream::stream! {
        let mut batches = std::pin::pin!(batches);
        let mut sent = 0usize;
        while let Some(batch) = batches.next().await {
            match encode_batch(&batch) {
                Ok(chunk) => {
                    sent += 1;
                    tracing::debug!(size = batch.len(), sent, "batch written");
                    yield Ok(chunk);
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch encoding failed, aborting response");
                    yield Err(e);
                    break;
                }
            }
        }
        tracing::debug!(batches = sent, "response stream complete");
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body),
    )
        .into_response()
}
