//! Batch serialization: msgpack encoding plus gzip framing.
//!
//! The write endpoint takes `Content-Type: application/msgpack` with
//! `Content-Encoding: gzip`. Encoding uses named (map) mode so the payload
//! is a string-keyed msgpack document, the shape the backend expects from
//! any client. NaN and infinities pass through: msgpack f64 carries them
//! and the destination owns any rejection policy.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::columnar::ColumnarBatch;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("msgpack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("gzip compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

/// Serializes a batch to msgpack.
pub fn encode(batch: &ColumnarBatch) -> Result<Vec<u8>, PayloadError> {
    Ok(rmp_serde::to_vec_named(batch)?)
}

/// Gzip-compresses an encoded payload.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, PayloadError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Encode then compress, the exact body shipped to the write endpoint.
pub fn encode_compressed(batch: &ColumnarBatch) -> Result<Vec<u8>, PayloadError> {
    compress(&encode(batch)?)
}
