//! Workunit codec: payloads to inline `data:` addresses and back.
//!
//! Payloads travel as their canonical text embedded directly in the
//! address, so no external storage is involved. The fingerprint is the
//! MD5 of that text, which is what workers check downloaded files against.

use base64::Engine as _;
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt::{Debug, Display};
use std::str::FromStr;
use thiserror::Error;

/// Media type used for encoded payloads.
const MEDIA_TYPE: &str = "text/plain";

/// Bytes that must be escaped inside the data part of an address.
const DATA_ESCAPE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%');

/// A domain value that can be shipped as a workunit input.
///
/// The canonical text form is `Display`; decoding goes through `FromStr`.
pub trait Payload: Clone + Debug + Display + FromStr + Send + 'static {
    /// Estimated run time in seconds, passed to the broker as a hint.
    fn estimated_duration(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unsupported address scheme: {0}")]
    UnsupportedScheme(String),

    #[error("malformed data address: {0}")]
    Malformed(String),

    #[error("invalid literal: {0:?}")]
    InvalidLiteral(String),
}

/// An encoded payload: fingerprint plus inline address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub fingerprint: String,
    pub address: String,
}

/// Hex MD5 of `text`.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a payload, fingerprint it, and embed it in a `data:` address.
pub fn encode<P: Payload>(payload: &P) -> Encoded {
    let text = payload.to_string();
    Encoded {
        fingerprint: fingerprint(&text),
        address: format!(
            "data:{MEDIA_TYPE},{}",
            utf8_percent_encode(&text, DATA_ESCAPE)
        ),
    }
}

/// Whether `address` uses the inline scheme this codec understands.
pub fn is_inline(address: &str) -> bool {
    scheme(address).is_some_and(|s| s.eq_ignore_ascii_case("data"))
}

/// Decode an inline address back into a payload.
///
/// Accepts `data:[<mediatype>][;base64],<data>`; the literal may be
/// percent-escaped and surrounding whitespace is ignored.
pub fn decode<P: Payload>(address: &str) -> Result<P, CodecError> {
    let text = decode_text(address)?;
    let literal = text.trim();
    literal
        .parse::<P>()
        .map_err(|_| CodecError::InvalidLiteral(literal.to_string()))
}

/// Decode an inline address to its raw text content.
pub fn decode_text(address: &str) -> Result<String, CodecError> {
    let Some(scheme) = scheme(address) else {
        return Err(CodecError::Malformed(address.to_string()));
    };
    if !scheme.eq_ignore_ascii_case("data") {
        return Err(CodecError::UnsupportedScheme(scheme.to_string()));
    }

    let rest = &address[scheme.len() + 1..];
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| CodecError::Malformed(address.to_string()))?;

    let bytes: Vec<u8> = percent_decode_str(data).collect();
    let bytes = if header
        .rsplit(';')
        .next()
        .is_some_and(|p| p.eq_ignore_ascii_case("base64"))
    {
        base64::engine::general_purpose::STANDARD
            .decode(bytes.trim_ascii())
            .map_err(|e| CodecError::Malformed(format!("bad base64: {e}")))?
    } else {
        bytes
    };

    String::from_utf8(bytes).map_err(|_| CodecError::Malformed("content is not utf-8".to_string()))
}

fn scheme(address: &str) -> Option<&str> {
    let (scheme, _) = address.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}
