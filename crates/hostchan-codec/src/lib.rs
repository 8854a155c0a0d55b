//! Message and method-call codecs for named host channels.
//!
//! Two codec families share this crate:
//!
//! - [`MessageCodec`] encodes whole messages for basic message channels:
//!   raw bytes, UTF-8 strings, JSON values, and the tagged structured
//!   binary encoding of [`StandardValue`].
//! - [`MethodCodec`] encodes tagged requests ([`MethodCall`]) and their
//!   reply envelopes ([`MethodReply`]) for method and event channels.
//!
//! Both endpoints of a channel must agree on the codec; it is part of the
//! wire contract alongside the channel name.

pub mod error;
pub mod message;
pub mod method;
pub mod value;

pub use error::{CodecError, Result};
pub use message::{BinaryCodec, JsonCodec, MessageCodec, StandardCodec, StringCodec};
pub use method::{
    JsonMethodCodec, MethodCall, MethodCodec, MethodReply, RemoteError, StandardMethodCodec,
};
pub use value::StandardValue;
