//! Outbound payloads and the base64 wire encoding.
//!
//! The transport moves bytes as base64 text in both directions. Outbound
//! payloads are first normalized to raw bytes (transcoding text with its
//! declared [`Encoding`]) and then wire-encoded; inbound `data` events are
//! wire-decoded back into [`Bytes`].
//!
//! # Example
//!
//! ```ignore
//! use evented_tcp::protocol::{Encoding, Payload, decode_wire};
//!
//! let payload = Payload::text("68690a", Encoding::Hex);
//! let wire = payload.to_wire()?;
//! assert_eq!(wire, "aGkK");
//! assert_eq!(&decode_wire(&wire)?[..], b"hi\n");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Decoder config accepting padded and unpadded input.
const LENIENT_CONFIG: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

/// Lenient standard-alphabet decoder for caller-supplied base64 text.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT_CONFIG);

/// Lenient URL-safe decoder for caller-supplied base64 text.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT_CONFIG);

// ============================================================================
// Encoding
// ============================================================================

/// Text encoding used to turn a string payload into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// UTF-8 (default).
    #[default]
    Utf8,
    /// 7-bit ASCII; keeps the low byte of each UTF-16 code unit.
    Ascii,
    /// ISO-8859-1 (`binary`); keeps the low byte of each UTF-16 code unit.
    Latin1,
    /// Base64 text, standard or URL-safe alphabet.
    Base64,
    /// Hexadecimal digit pairs.
    Hex,
    /// UTF-16 little endian (`ucs2`).
    Utf16Le,
}

impl Encoding {
    /// Returns the canonical encoding name.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Base64 => "base64",
            Self::Hex => "hex",
            Self::Utf16Le => "utf16le",
        }
    }

    /// Transcodes `text` into raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEncodedData`] if `text` is not valid base64 or hex
    /// for those encodings.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii | Self::Latin1 => Ok(text.encode_utf16().map(|unit| unit as u8).collect()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Hex => hex::decode(text).map_err(|e| Error::invalid_encoded_data(self, e.to_string())),
            Self::Base64 => decode_base64_text(text),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "base64" => Ok(Self::Base64),
            "hex" => Ok(Self::Hex),
            "ucs2" | "ucs-2" | "utf16le" | "utf-16le" => Ok(Self::Utf16Le),
            _ => Err(Error::unknown_encoding(name)),
        }
    }
}

/// Decodes caller-supplied base64, ignoring whitespace and padding.
fn decode_base64_text(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let engine = if compact.contains(['-', '_']) {
        &LENIENT_URL_SAFE
    } else {
        &LENIENT_STANDARD
    };

    engine
        .decode(compact.as_bytes())
        .map_err(|e| Error::invalid_encoded_data(Encoding::Base64, e.to_string()))
}

// ============================================================================
// Payload
// ============================================================================

/// Outbound data accepted by `write` and `end_with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// String plus the encoding used to turn it into bytes.
    Text {
        /// The text.
        text: String,
        /// Its encoding.
        encoding: Encoding,
    },
    /// Byte buffer, sent as-is.
    Buffer(Bytes),
    /// Plain byte array, sent as-is.
    Array(Vec<u8>),
}

impl Payload {
    /// Creates a text payload with an explicit encoding.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>, encoding: Encoding) -> Self {
        Self::Text {
            text: text.into(),
            encoding,
        }
    }

    /// Builds a payload from loosely-typed input.
    ///
    /// Strings become [`Payload::Text`] using `encoding` (UTF-8 when
    /// `None`); arrays of integers in `0..=255` become [`Payload::Array`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPayloadType`] for any other JSON type
    /// - [`Error::UnknownEncoding`] if `encoding` is not recognized
    pub fn from_value(value: &Value, encoding: Option<&str>) -> Result<Self> {
        match value {
            Value::String(text) => {
                let encoding = encoding.map(str::parse::<Encoding>).transpose()?.unwrap_or_default();
                Ok(Self::text(text.clone(), encoding))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| {
                            Error::invalid_payload_type(format!(
                                "array containing {}",
                                value_type_name(item)
                            ))
                        })
                })
                .collect::<Result<Vec<u8>>>()
                .map(Self::Array),
            other => Err(Error::invalid_payload_type(value_type_name(other))),
        }
    }

    /// Normalizes the payload to raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidEncodedData`] if a text payload is malformed for its
    /// encoding.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Self::Text { text, encoding } => encoding.encode(text).map(Bytes::from),
            Self::Buffer(bytes) => Ok(bytes.clone()),
            Self::Array(bytes) => Ok(Bytes::copy_from_slice(bytes)),
        }
    }

    /// Normalizes the payload and wire-encodes it.
    ///
    /// # Errors
    ///
    /// Same as [`Payload::to_bytes`].
    pub fn to_wire(&self) -> Result<String> {
        self.to_bytes().map(|bytes| encode_wire(&bytes))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::text(text, Encoding::Utf8)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::text(text, Encoding::Utf8)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Buffer(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Buffer(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Array(bytes)
    }
}

/// Names a JSON value's type for error messages.
fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Wire Encoding
// ============================================================================

/// Encodes raw bytes into the transport's wire text (padded base64).
#[inline]
#[must_use]
pub fn encode_wire(bytes: &[u8]) -> String {
    Base64Standard.encode(bytes)
}

/// Decodes wire text from the transport into bytes.
///
/// # Errors
///
/// [`Error::InvalidEncodedData`] if `wire` is not base64.
pub fn decode_wire(wire: &str) -> Result<Bytes> {
    LENIENT_STANDARD
        .decode(wire)
        .map(Bytes::from)
        .map_err(|e| Error::invalid_encoded_data(Encoding::Base64, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("binary".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert_eq!("ucs2".parse::<Encoding>().unwrap(), Encoding::Utf16Le);
        assert!(matches!(
            "utf7".parse::<Encoding>(),
            Err(Error::UnknownEncoding { .. })
        ));
    }

    #[test]
    fn test_text_payload_to_wire() {
        assert_eq!(Payload::from("hi").to_wire().unwrap(), "aGk=");
        assert_eq!(Payload::text("6869", Encoding::Hex).to_wire().unwrap(), "aGk=");
        assert_eq!(Payload::text("aGk", Encoding::Base64).to_wire().unwrap(), "aGk=");
    }

    #[test]
    fn test_latin1_keeps_low_byte() {
        let bytes = Encoding::Latin1.encode("\u{e9}\u{0141}").unwrap();
        assert_eq!(bytes, vec![0xe9, 0x41]);
    }

    #[test]
    fn test_utf16le() {
        let bytes = Encoding::Utf16Le.encode("hi").unwrap();
        assert_eq!(bytes, vec![b'h', 0, b'i', 0]);
    }

    #[test]
    fn test_base64_text_is_lenient() {
        let bytes = Encoding::Base64.encode("aG k-\n").unwrap();
        assert_eq!(bytes, vec![0x68, 0x69, 0x3e]);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        let err = Encoding::Hex.encode("zz").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidEncodedData {
                encoding: Encoding::Hex,
                ..
            }
        ));
    }

    #[test]
    fn test_array_payload_is_wire_encoded() {
        let payload = Payload::from(vec![1u8, 2, 3]);
        assert!(matches!(payload, Payload::Array(_)));
        assert_eq!(payload.to_wire().unwrap(), "AQID");
    }

    #[test]
    fn test_from_value() {
        let text = Payload::from_value(&json!("6869"), Some("hex")).unwrap();
        assert_eq!(text, Payload::text("6869", Encoding::Hex));

        let array = Payload::from_value(&json!([104, 105]), None).unwrap();
        assert_eq!(array, Payload::Array(vec![104, 105]));
    }

    #[test]
    fn test_from_value_rejects_other_types() {
        let err = Payload::from_value(&json!({"a": 1}), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payload: expected a string or byte array, got object"
        );

        let err = Payload::from_value(&json!(42), None).unwrap_err();
        assert!(matches!(err, Error::InvalidPayloadType { ref type_name } if type_name == "number"));

        let err = Payload::from_value(&json!([1, 300]), None).unwrap_err();
        assert!(matches!(err, Error::InvalidPayloadType { .. }));
    }

    #[test]
    fn test_decode_wire_rejects_garbage() {
        assert!(decode_wire("***").is_err());
    }

    proptest! {
        #[test]
        fn prop_wire_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let wire = Payload::from(data.as_slice()).to_wire().unwrap();
            let decoded = decode_wire(&wire).unwrap();
            prop_assert_eq!(&decoded[..], &data[..]);
        }
    }
}
