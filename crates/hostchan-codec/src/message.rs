use bytes::{Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::value::{read_value, write_value, StandardValue};

/// Strategy for encoding whole messages on a basic message channel.
///
/// Both endpoints must use the same codec; mismatches surface as decode
/// errors on the receiving side.
pub trait MessageCodec {
    type Message;

    fn encode_message(&self, message: &Self::Message) -> Result<Bytes>;
    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message>;
}

/// Identity codec: payloads pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl MessageCodec for BinaryCodec {
    type Message = Bytes;

    fn encode_message(&self, message: &Bytes) -> Result<Bytes> {
        Ok(message.clone())
    }

    fn decode_message(&self, payload: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

/// UTF-8 string codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl MessageCodec for StringCodec {
    type Message = String;

    fn encode_message(&self, message: &String) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(message.as_bytes()))
    }

    fn decode_message(&self, payload: &[u8]) -> Result<String> {
        Ok(std::str::from_utf8(payload)?.to_owned())
    }
}

/// JSON codec over [`serde_json::Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    type Message = serde_json::Value;

    fn encode_message(&self, message: &serde_json::Value) -> Result<Bytes> {
        Ok(serde_json::to_vec(message)?.into())
    }

    fn decode_message(&self, payload: &[u8]) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Tagged structured binary codec over [`StandardValue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodec;

impl MessageCodec for StandardCodec {
    type Message = StandardValue;

    fn encode_message(&self, message: &StandardValue) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        write_value(message, &mut buf)?;
        Ok(buf.freeze())
    }

    fn decode_message(&self, payload: &[u8]) -> Result<StandardValue> {
        let mut src = payload;
        let value = read_value(&mut src, payload.len())?;
        if !src.is_empty() {
            return Err(CodecError::TrailingBytes(src.len()));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn binary_codec_is_identity() {
        let codec = BinaryCodec;
        let payload = Bytes::from_static(&[0, 1, 2, 0xFF]);
        let encoded = codec.encode_message(&payload).expect("encode");
        assert_eq!(encoded, payload);
        assert_eq!(codec.decode_message(&encoded).expect("decode"), payload);
    }

    #[test]
    fn string_codec_roundtrip() {
        let codec = StringCodec;
        let encoded = codec.encode_message(&"grüß".to_owned()).expect("encode");
        assert_eq!(codec.decode_message(&encoded).expect("decode"), "grüß");
    }

    #[test]
    fn string_codec_rejects_invalid_utf8() {
        let err = StringCodec.decode_message(&[0xC3, 0x28]).unwrap_err();
        assert!(matches!(err, CodecError::Utf8(_)));
    }

    #[test]
    fn json_codec_roundtrip() {
        let codec = JsonCodec;
        let value = json!({ "n": 5, "nested": [1, 2, null] });
        let encoded = codec.encode_message(&value).expect("encode");
        assert_eq!(codec.decode_message(&encoded).expect("decode"), value);
    }

    #[test]
    fn json_codec_rejects_garbage() {
        let err = JsonCodec.decode_message(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn standard_codec_roundtrip() {
        let codec = StandardCodec;
        let value = StandardValue::Map(vec![("n".into(), 9i64.into())]);
        let encoded = codec.encode_message(&value).expect("encode");
        assert_eq!(codec.decode_message(&encoded).expect("decode"), value);
    }

    #[test]
    fn standard_codec_rejects_trailing_bytes() {
        let codec = StandardCodec;
        let mut encoded = codec
            .encode_message(&StandardValue::Null)
            .expect("encode")
            .to_vec();
        encoded.push(0x00);
        let err = codec.decode_message(&encoded).unwrap_err();
        assert!(matches!(err, CodecError::TrailingBytes(1)));
    }
}
