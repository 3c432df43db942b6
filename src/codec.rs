//! Payload encoding for the bridge wire format
//!
//! `fileContent` arrives either as base64 or as plain UTF-8 text. Base64 input
//! may be MIME-wrapped, so ASCII whitespace is dropped before decoding.
//!
//! Replacement policy: when bytes are turned back into text (`readFile`),
//! invalid UTF-8 sequences become U+FFFD. Raw decoding never fails because
//! the input is already a valid `&str`.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::BridgeError;
use crate::types::Encoding;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str, encoding: Encoding) -> Result<Vec<u8>, BridgeError> {
    match encoding {
        Encoding::Raw => Ok(text.as_bytes().to_vec()),
        Encoding::Base64 => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| BridgeError::MalformedPayload(e.to_string()))
        }
    }
}

/// Parse the `encoding` argument of `saveFile`
pub fn parse_encoding(name: &str) -> Result<Encoding, BridgeError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "base64" => Ok(Encoding::Base64),
        "utf8" | "utf-8" | "raw" | "text" => Ok(Encoding::Raw),
        other => Err(BridgeError::MalformedPayload(format!(
            "unsupported encoding '{}'",
            other
        ))),
    }
}

/// Bytes to text with U+FFFD replacement
pub fn bytes_to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
