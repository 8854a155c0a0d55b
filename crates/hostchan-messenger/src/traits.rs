use std::rc::Rc;

use bytes::Bytes;

/// One-shot callback that delivers the reply for a single message.
///
/// An empty reply (`None`) means the remote side produced no payload for
/// this message; the channel layer maps that to not-implemented.
pub type BinaryReply = Box<dyn FnOnce(Option<Bytes>)>;

/// Callback invoked when a message arrives on a bound channel name.
///
/// The second argument is the reply surface for this message and fires at
/// most once. Handlers run to completion on the thread that delivers the
/// transport callback.
pub type BinaryHandler = Rc<dyn Fn(Option<Bytes>, BinaryReply)>;

/// A duplex byte-message transport addressed by channel name.
///
/// The channel name is the wire contract: it must match verbatim on both
/// sides of the boundary. A name identifies exactly one logical conduit for
/// the lifetime of the session.
pub trait BinaryMessenger {
    /// Send a message on a named channel, fire-and-forget.
    ///
    /// When `reply` is given it fires exactly once, with `None` if the
    /// other side has no handler bound or its handler produced no payload.
    fn send(&self, channel: &str, message: Option<Bytes>, reply: Option<BinaryReply>);

    /// Bind the handler for `channel`, replacing any previous one.
    ///
    /// Passing `None` detaches; detaching an unbound name is a no-op.
    fn set_handler(&self, channel: &str, handler: Option<BinaryHandler>);
}
