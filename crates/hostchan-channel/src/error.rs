/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A payload failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] hostchan_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
