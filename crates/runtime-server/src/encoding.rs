//! Reversible string encoding used to tag correlation ids.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// A reversible text transform. `decode(encode(s)) == Some(s)` for any `s`.
pub trait Encoding: Send + Sync {
    fn encode(&self, value: &str) -> String;

    /// `None` when `value` was not produced by [`Encoding::encode`].
    fn decode(&self, value: &str) -> Option<String>;
}

/// Standard-alphabet base64 over the UTF-8 bytes, so any Unicode text
/// survives the round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encoding;

impl Encoding for Base64Encoding {
    fn encode(&self, value: &str) -> String {
        STANDARD.encode(value.as_bytes())
    }

    fn decode(&self, value: &str) -> Option<String> {
        let bytes = STANDARD.decode(value).ok()?;
        String::from_utf8(bytes).ok()
    }
}
