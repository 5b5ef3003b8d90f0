//! Tile payload validation and decoding.

use image::RgbaImage;
use thiserror::Error;

/// Payload decoding errors.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload was empty.
    #[error("empty tile payload")]
    EmptyPayload,
    /// The payload has no recognizable image header. Typically an HTML
    /// error page served in place of a tile.
    #[error("tile payload is not a recognizable image")]
    UnrecognizedFormat,
    /// The payload looked like an image but failed to decode.
    #[error("tile payload failed to decode: {0}")]
    Malformed(String),
}

/// Decode a tile payload into an RGBA bitmap.
///
/// The magic bytes are checked before decoding so that error pages and
/// truncated responses are rejected without spending decode cycles.
pub fn decode_tile_payload(payload: &[u8]) -> Result<RgbaImage, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    let format = image::guess_format(payload).map_err(|_| DecodeError::UnrecognizedFormat)?;
    let decoded = image::load_from_memory_with_format(payload, format)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    Ok(decoded.to_rgba8())
}
