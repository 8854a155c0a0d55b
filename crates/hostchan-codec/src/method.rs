use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{json, Value};

use crate::error::{CodecError, Result};
use crate::value::{read_value, write_value, StandardValue};

/// A tagged request: method name plus optional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall<V> {
    pub method: String,
    pub arguments: Option<V>,
}

impl<V> MethodCall<V> {
    pub fn new(method: impl Into<String>, arguments: Option<V>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// An error produced by the remote handler, surfaced verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError<V> {
    pub code: String,
    pub message: Option<String>,
    pub details: Option<V>,
}

impl<V> RemoteError<V> {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
            details: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: V) -> Self {
        self.details = Some(details);
        self
    }
}

/// The outcome of a single request. At most one reply per request.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodReply<V> {
    Success(Option<V>),
    Error(RemoteError<V>),
    NotImplemented,
}

/// Strategy for encoding call and reply envelopes.
///
/// Not-implemented has no envelope of its own: on the wire it is an empty
/// reply payload, mapped by the channel layer. `decode_reply` therefore
/// only ever yields `Success` or `Error`.
pub trait MethodCodec {
    type Value;

    fn encode_call(&self, call: &MethodCall<Self::Value>) -> Result<Bytes>;
    fn decode_call(&self, payload: &[u8]) -> Result<MethodCall<Self::Value>>;
    fn encode_success(&self, value: Option<&Self::Value>) -> Result<Bytes>;
    fn encode_error(&self, error: &RemoteError<Self::Value>) -> Result<Bytes>;
    fn decode_reply(&self, payload: &[u8]) -> Result<MethodReply<Self::Value>>;
}

const METHOD_KEY: &str = "method";
const ARGS_KEY: &str = "args";

/// JSON method codec.
///
/// Calls are objects `{"method": m, "args": a}`; a success reply is a
/// one-element array `[value]`; an error reply is `[code, message, details]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMethodCodec;

impl MethodCodec for JsonMethodCodec {
    type Value = Value;

    fn encode_call(&self, call: &MethodCall<Value>) -> Result<Bytes> {
        let body = json!({
            METHOD_KEY: call.method,
            ARGS_KEY: call.arguments.clone().unwrap_or(Value::Null),
        });
        Ok(serde_json::to_vec(&body)?.into())
    }

    fn decode_call(&self, payload: &[u8]) -> Result<MethodCall<Value>> {
        let value: Value = serde_json::from_slice(payload)?;
        let Value::Object(mut fields) = value else {
            return Err(CodecError::malformed("call is not an object"));
        };
        let method = match fields.remove(METHOD_KEY) {
            Some(Value::String(method)) => method,
            _ => return Err(CodecError::malformed("missing \"method\" string")),
        };
        let arguments = match fields.remove(ARGS_KEY) {
            None | Some(Value::Null) => None,
            Some(arguments) => Some(arguments),
        };
        Ok(MethodCall { method, arguments })
    }

    fn encode_success(&self, value: Option<&Value>) -> Result<Bytes> {
        let envelope = Value::Array(vec![value.cloned().unwrap_or(Value::Null)]);
        Ok(serde_json::to_vec(&envelope)?.into())
    }

    fn encode_error(&self, error: &RemoteError<Value>) -> Result<Bytes> {
        let envelope = json!([error.code, error.message, error.details]);
        Ok(serde_json::to_vec(&envelope)?.into())
    }

    fn decode_reply(&self, payload: &[u8]) -> Result<MethodReply<Value>> {
        let value: Value = serde_json::from_slice(payload)?;
        let Value::Array(mut items) = value else {
            return Err(CodecError::malformed("reply is not an array"));
        };
        match items.len() {
            1 => {
                let value = items.pop().filter(|v| !v.is_null());
                Ok(MethodReply::Success(value))
            }
            3 => {
                let details = items.pop().filter(|v| !v.is_null());
                let message = match items.pop() {
                    Some(Value::String(message)) => Some(message),
                    Some(Value::Null) | None => None,
                    Some(_) => {
                        return Err(CodecError::malformed("error message is not a string"))
                    }
                };
                let code = match items.pop() {
                    Some(Value::String(code)) => code,
                    _ => return Err(CodecError::malformed("error code is not a string")),
                };
                Ok(MethodReply::Error(RemoteError {
                    code,
                    message,
                    details,
                }))
            }
            n => Err(CodecError::malformed(format!(
                "reply envelope has {n} elements"
            ))),
        }
    }
}

// Envelope tags for the structured method codec.
const ENVELOPE_SUCCESS: u8 = 0x00;
const ENVELOPE_ERROR: u8 = 0x01;

/// Structured method codec over [`StandardValue`].
///
/// A call is the method name value followed by the argument value; replies
/// carry a one-byte envelope tag (success/error) followed by the payload
/// values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMethodCodec;

impl StandardMethodCodec {
    fn optional(value: StandardValue) -> Option<StandardValue> {
        match value {
            StandardValue::Null => None,
            value => Some(value),
        }
    }
}

impl MethodCodec for StandardMethodCodec {
    type Value = StandardValue;

    fn encode_call(&self, call: &MethodCall<StandardValue>) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        write_value(&StandardValue::String(call.method.clone()), &mut buf)?;
        write_value(
            call.arguments.as_ref().unwrap_or(&StandardValue::Null),
            &mut buf,
        )?;
        Ok(buf.freeze())
    }

    fn decode_call(&self, payload: &[u8]) -> Result<MethodCall<StandardValue>> {
        let full = payload.len();
        let mut src = payload;
        let method = match read_value(&mut src, full)? {
            StandardValue::String(method) => method,
            _ => return Err(CodecError::malformed("method name is not a string")),
        };
        let arguments = Self::optional(read_value(&mut src, full)?);
        if !src.is_empty() {
            return Err(CodecError::TrailingBytes(src.len()));
        }
        Ok(MethodCall { method, arguments })
    }

    fn encode_success(&self, value: Option<&StandardValue>) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        buf.put_u8(ENVELOPE_SUCCESS);
        write_value(value.unwrap_or(&StandardValue::Null), &mut buf)?;
        Ok(buf.freeze())
    }

    fn encode_error(&self, error: &RemoteError<StandardValue>) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        buf.put_u8(ENVELOPE_ERROR);
        write_value(&StandardValue::String(error.code.clone()), &mut buf)?;
        let message = error
            .message
            .as_ref()
            .map_or(StandardValue::Null, |m| StandardValue::String(m.clone()));
        write_value(&message, &mut buf)?;
        write_value(
            error.details.as_ref().unwrap_or(&StandardValue::Null),
            &mut buf,
        )?;
        Ok(buf.freeze())
    }

    fn decode_reply(&self, payload: &[u8]) -> Result<MethodReply<StandardValue>> {
        let full = payload.len();
        let mut src = payload;
        if src.is_empty() {
            return Err(CodecError::Truncated {
                needed: 1,
                remaining: 0,
            });
        }
        let tag = src.get_u8();
        let reply = match tag {
            ENVELOPE_SUCCESS => MethodReply::Success(Self::optional(read_value(&mut src, full)?)),
            ENVELOPE_ERROR => {
                let code = match read_value(&mut src, full)? {
                    StandardValue::String(code) => code,
                    _ => return Err(CodecError::malformed("error code is not a string")),
                };
                let message = match read_value(&mut src, full)? {
                    StandardValue::Null => None,
                    StandardValue::String(message) => Some(message),
                    _ => return Err(CodecError::malformed("error message is not a string")),
                };
                let details = Self::optional(read_value(&mut src, full)?);
                MethodReply::Error(RemoteError {
                    code,
                    message,
                    details,
                })
            }
            tag => {
                return Err(CodecError::malformed(format!(
                    "unknown reply envelope tag 0x{tag:02x}"
                )))
            }
        };
        if !src.is_empty() {
            return Err(CodecError::TrailingBytes(src.len()));
        }
        Ok(reply)
    }
}
