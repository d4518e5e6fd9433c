//! Base64 text blobs.
//!
//! Meshes are shipped to the viewer as base64 text so they can be pasted
//! into a text box. The text is line-wrapped; any ASCII whitespace is
//! dropped before decoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Line width of encoded blobs.
pub const LINE_WIDTH: usize = 76;

#[derive(Debug, Error)]
pub enum Base64Error {
    #[error("invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Decode a base64 blob, ignoring line breaks and other whitespace.
pub fn decode_text(text: &str) -> Result<Vec<u8>, Base64Error> {
    let compact: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

/// Encode bytes as base64 wrapped at [`LINE_WIDTH`] columns, every line
/// newline-terminated.
pub fn encode_text(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 1);
    // base64 output is ASCII, so byte chunks are valid char boundaries.
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.extend(line.iter().map(|&b| b as char));
        out.push('\n');
    }
    out
}
