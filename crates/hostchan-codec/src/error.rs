/// Errors that can occur while encoding or decoding channel payloads.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A string payload is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A JSON payload failed to parse or serialize.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A structured payload carries an unknown type tag.
    #[error("unknown type tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A structured payload ended before the announced value did.
    #[error("truncated payload ({remaining} bytes left, {needed} needed)")]
    Truncated { needed: usize, remaining: usize },

    /// A structured value nests deeper than the decoder allows.
    #[error("value nesting too deep (max {max})")]
    TooDeep { max: usize },

    /// A value exceeds what the length prefix can describe.
    #[error("value too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// Bytes remain after a complete value was decoded.
    #[error("trailing bytes after value ({0} left)")]
    TrailingBytes(usize),

    /// The payload decoded but does not form a valid call or reply envelope.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },
}

impl CodecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CodecError::MalformedEnvelope {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
