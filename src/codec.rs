//! Record encodings.
//!
//! Every record variant reduces to raw bytes. Keys and text use a single byte
//! per character (code points 0 to 255), structured values are ASCII-only JSON
//! text, and blob/value pairs are wrapped in a `{"d": <base64>, "j": <value>}`
//! envelope.

use std::io;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;

use crate::error::{DatasetError, DatasetResult};

pub mod image;
#[cfg(feature = "raster")]
pub mod raster;

pub use image::{ImageCodec, PixelBuffer, PixelFrameCodec, PixelLayout};
#[cfg(feature = "raster")]
pub use raster::{RasterCodec, RasterFormat};

/// LMDB's default maximum key size.
pub const MAX_KEY_BYTES: usize = 511;

fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encodes a dataset key into the bytes used by the shard stores.
pub fn encode_key(key: &str) -> DatasetResult<Vec<u8>> {
    let invalid = |reason| DatasetError::InvalidKey {
        key: key.to_owned(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("keys must not be empty"));
    }
    let encoded = encode_latin1(key)
        .ok_or_else(|| invalid("keys may only contain characters U+0000..=U+00FF"))?;
    if encoded.len() > MAX_KEY_BYTES {
        return Err(invalid("keys are limited to 511 single-byte characters"));
    }
    Ok(encoded)
}

pub fn decode_key(bytes: &[u8]) -> String {
    decode_latin1(bytes)
}

pub fn encode_text(text: &str) -> DatasetResult<Vec<u8>> {
    encode_latin1(text).ok_or_else(|| DatasetError::ValueType {
        expected: "text",
        reason: "text may only contain characters U+0000..=U+00FF".to_owned(),
    })
}

pub fn decode_text(bytes: &[u8]) -> String {
    decode_latin1(bytes)
}

/// Compact JSON formatter that escapes every non-ASCII character, so the
/// output is always single-byte encodable.
#[derive(Debug, Default, Clone, Copy)]
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&bytes[start..index])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(&bytes[start..])
    }
}

/// Serializes `value` as compact, ASCII-only JSON.
pub fn to_ascii_json<T: Serialize + ?Sized>(value: &T) -> DatasetResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

pub fn encode_json(value: &Value) -> DatasetResult<Vec<u8>> {
    to_ascii_json(value)
}

pub fn decode_json(bytes: &[u8]) -> DatasetResult<Value> {
    Ok(serde_json::from_str(&decode_text(bytes))?)
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    d: String,
    j: &'a Value,
}

pub fn encode_envelope(blob: &[u8], value: &Value) -> DatasetResult<Vec<u8>> {
    to_ascii_json(&EnvelopeRef {
        d: BASE64.encode(blob),
        j: value,
    })
}

/// Splits an envelope back into its blob and value.
///
/// Line breaks and other ASCII whitespace inside `d` are ignored; MIME-style
/// wrapped base64 decodes the same as the unwrapped form.
pub fn decode_envelope(bytes: &[u8]) -> DatasetResult<(Vec<u8>, Value)> {
    let malformed = |reason| DatasetError::MalformedEnvelope { reason };

    let Value::Object(mut fields) = decode_json(bytes)? else {
        return Err(malformed("envelope is not a JSON object"));
    };
    let blob = match fields.remove("d") {
        Some(Value::String(encoded)) => {
            let compact: Vec<u8> = encoded
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            BASE64.decode(compact)?
        }
        Some(_) => return Err(malformed("field 'd' is not a string")),
        None => return Err(malformed("missing field 'd'")),
    };
    let value = fields
        .remove("j")
        .ok_or_else(|| malformed("missing field 'j'"))?;
    Ok((blob, value))
}

/// A record handed to [`RecordWriter::store`](crate::RecordWriter::store).
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
    Json(&'a Value),
    Image(&'a PixelBuffer),
    Pair(&'a [u8], &'a Value),
    TextPair(&'a str, &'a Value),
    ImagePair(&'a PixelBuffer, &'a Value),
}

impl Payload<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Text(_) => "text",
            Payload::Json(_) => "json",
            Payload::Image(_) => "image",
            Payload::Pair(..) => "data/json pair",
            Payload::TextPair(..) => "text/json pair",
            Payload::ImagePair(..) => "image/json pair",
        }
    }

    /// Checks the payload without encoding it.
    pub fn validate(&self) -> DatasetResult<()> {
        match self {
            Payload::Text(text) | Payload::TextPair(text, _) => {
                if text.chars().all(|ch| u32::from(ch) <= 0xFF) {
                    Ok(())
                } else {
                    Err(DatasetError::ValueType {
                        expected: self.kind(),
                        reason: "text may only contain characters U+0000..=U+00FF".to_owned(),
                    })
                }
            }
            Payload::Image(image) | Payload::ImagePair(image, _) => image.validate(),
            Payload::Bytes(_) | Payload::Json(_) | Payload::Pair(..) => Ok(()),
        }
    }

    pub fn encode(&self, images: &dyn ImageCodec) -> DatasetResult<Vec<u8>> {
        match *self {
            Payload::Bytes(data) => Ok(data.to_vec()),
            Payload::Text(text) => encode_text(text),
            Payload::Json(value) => encode_json(value),
            Payload::Image(image) => images.encode(image),
            Payload::Pair(data, value) => encode_envelope(data, value),
            Payload::TextPair(text, value) => encode_envelope(&encode_text(text)?, value),
            Payload::ImagePair(image, value) => encode_envelope(&images.encode(image)?, value),
        }
    }
}
