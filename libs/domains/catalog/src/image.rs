//! Base64 image helpers.

use base64::{
    Engine as _, alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
};

use crate::error::{CatalogError, CatalogResult};

/// Largest decoded image accepted in a product payload (2 MiB)
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

/// Standard alphabet, padded; tolerates non-zero trailing bits on decode.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Drop a `data:<mime>;base64,` header if present.
pub fn strip_data_uri(image: &str) -> &str {
    match image.find(',') {
        Some(idx) => &image[idx + 1..],
        None => image,
    }
}

/// Base64 text without its header and without whitespace or line breaks.
fn payload(image: &str) -> String {
    strip_data_uri(image)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect()
}

pub fn is_valid_base64(image: &str) -> bool {
    let payload = payload(image);
    payload.is_empty() || BASE64.decode(payload).is_ok()
}

/// Decoded size computed from the text length and padding, without decoding.
pub fn decoded_len(image: &str) -> u64 {
    let payload = payload(image);
    let padding = if payload.ends_with("==") {
        2
    } else if payload.ends_with('=') {
        1
    } else {
        0
    };

    (payload.len() as u64 * 3 / 4).saturating_sub(padding)
}

pub fn within_size_limit(image: &str, max_bytes: u64) -> bool {
    decoded_len(image) <= max_bytes
}

/// Decode a transported image. Blank input, or a header with nothing
/// after it, means "no image".
pub fn decode(image: Option<&str>) -> CatalogResult<Option<Vec<u8>>> {
    let Some(payload) = image.map(payload).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    BASE64
        .decode(payload)
        .map(Some)
        .map_err(|e| CatalogError::InvalidImage(e.to_string()))
}

pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
