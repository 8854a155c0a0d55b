use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

// Type tags for the structured wire encoding.
const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_BYTES: u8 = 0x06;
const TAG_LIST: u8 = 0x07;
const TAG_MAP: u8 = 0x08;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 32;

/// A structured value carried by [`StandardCodec`](crate::StandardCodec).
///
/// Wire format: one tag byte per value. Scalars are fixed-width
/// little-endian; strings, byte blobs and containers carry a u32-LE length
/// prefix. Map entries preserve insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum StandardValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    List(Vec<StandardValue>),
    Map(Vec<(StandardValue, StandardValue)>),
}

impl StandardValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StandardValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StandardValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a map entry whose key is the given string.
    pub fn get(&self, key: &str) -> Option<&StandardValue> {
        match self {
            StandardValue::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for StandardValue {
    fn from(v: bool) -> Self {
        StandardValue::Bool(v)
    }
}

impl From<i64> for StandardValue {
    fn from(v: i64) -> Self {
        StandardValue::Int(v)
    }
}

impl From<f64> for StandardValue {
    fn from(v: f64) -> Self {
        StandardValue::Float(v)
    }
}

impl From<&str> for StandardValue {
    fn from(v: &str) -> Self {
        StandardValue::String(v.to_owned())
    }
}

impl From<String> for StandardValue {
    fn from(v: String) -> Self {
        StandardValue::String(v)
    }
}

impl From<Bytes> for StandardValue {
    fn from(v: Bytes) -> Self {
        StandardValue::Bytes(v)
    }
}

impl From<Vec<StandardValue>> for StandardValue {
    fn from(v: Vec<StandardValue>) -> Self {
        StandardValue::List(v)
    }
}

/// Append the wire encoding of `value` to `dst`.
pub(crate) fn write_value(value: &StandardValue, dst: &mut BytesMut) -> Result<()> {
    match value {
        StandardValue::Null => dst.put_u8(TAG_NULL),
        StandardValue::Bool(false) => dst.put_u8(TAG_FALSE),
        StandardValue::Bool(true) => dst.put_u8(TAG_TRUE),
        StandardValue::Int(v) => {
            dst.put_u8(TAG_INT);
            dst.put_i64_le(*v);
        }
        StandardValue::Float(v) => {
            dst.put_u8(TAG_FLOAT);
            dst.put_f64_le(*v);
        }
        StandardValue::String(v) => {
            dst.put_u8(TAG_STRING);
            put_len(dst, v.len())?;
            dst.put_slice(v.as_bytes());
        }
        StandardValue::Bytes(v) => {
            dst.put_u8(TAG_BYTES);
            put_len(dst, v.len())?;
            dst.put_slice(v);
        }
        StandardValue::List(items) => {
            dst.put_u8(TAG_LIST);
            put_len(dst, items.len())?;
            for item in items {
                write_value(item, dst)?;
            }
        }
        StandardValue::Map(entries) => {
            dst.put_u8(TAG_MAP);
            put_len(dst, entries.len())?;
            for (key, value) in entries {
                write_value(key, dst)?;
                write_value(value, dst)?;
            }
        }
    }
    Ok(())
}

/// Decode one value from the front of `src`, advancing it.
///
/// `full` is the original payload length, used to report offsets.
pub(crate) fn read_value(src: &mut &[u8], full: usize) -> Result<StandardValue> {
    read_value_at_depth(src, full, 0)
}

fn read_value_at_depth(src: &mut &[u8], full: usize, depth: usize) -> Result<StandardValue> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep { max: MAX_DEPTH });
    }

    let offset = full - src.len();
    need(src, 1)?;
    let tag = src.get_u8();

    match tag {
        TAG_NULL => Ok(StandardValue::Null),
        TAG_FALSE => Ok(StandardValue::Bool(false)),
        TAG_TRUE => Ok(StandardValue::Bool(true)),
        TAG_INT => {
            need(src, 8)?;
            Ok(StandardValue::Int(src.get_i64_le()))
        }
        TAG_FLOAT => {
            need(src, 8)?;
            Ok(StandardValue::Float(src.get_f64_le()))
        }
        TAG_STRING => {
            let data = take_len_prefixed(src)?;
            Ok(StandardValue::String(std::str::from_utf8(data)?.to_owned()))
        }
        TAG_BYTES => {
            let data = take_len_prefixed(src)?;
            Ok(StandardValue::Bytes(Bytes::copy_from_slice(data)))
        }
        TAG_LIST => {
            let count = read_count(src)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value_at_depth(src, full, depth + 1)?);
            }
            Ok(StandardValue::List(items))
        }
        TAG_MAP => {
            let count = read_count(src)?;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = read_value_at_depth(src, full, depth + 1)?;
                let value = read_value_at_depth(src, full, depth + 1)?;
                entries.push((key, value));
            }
            Ok(StandardValue::Map(entries))
        }
        tag => Err(CodecError::UnknownTag { tag, offset }),
    }
}

fn put_len(dst: &mut BytesMut, len: usize) -> Result<()> {
    if len > u32::MAX as usize {
        return Err(CodecError::TooLarge {
            size: len,
            max: u32::MAX as usize,
        });
    }
    dst.put_u32_le(len as u32);
    Ok(())
}

fn need(src: &&[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: src.len(),
        });
    }
    Ok(())
}

fn read_count(src: &mut &[u8]) -> Result<usize> {
    need(src, 4)?;
    let count = src.get_u32_le() as usize;
    // Every element occupies at least its tag byte.
    if count > src.len() {
        return Err(CodecError::Truncated {
            needed: count,
            remaining: src.len(),
        });
    }
    Ok(count)
}

fn take_len_prefixed<'a>(src: &mut &'a [u8]) -> Result<&'a [u8]> {
    need(src, 4)?;
    let len = src.get_u32_le() as usize;
    need(src, len)?;
    let (data, rest) = src.split_at(len);
    *src = rest;
    Ok(data)
}
