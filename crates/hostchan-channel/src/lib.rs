//! Channel adapters over a binary messenger.
//!
//! This is the "just works" layer. Bind a named channel, attach a handler,
//! invoke methods or push events across the host/embedded-runtime boundary:
//!
//! - [`MethodChannel`] — request/reply with tagged method calls.
//! - [`BasicMessageChannel`] — whole-message exchange with optional
//!   acknowledgment.
//! - [`EventChannel`] — one listener at a time, pushed events, explicit
//!   end-of-stream, cooperative cancellation.
//!
//! Every adapter owns exactly one channel name. `close()` detaches the
//! bound handler and is idempotent; a leaked handle is reclaimed when the
//! owning host goes away.

pub mod error;
pub mod event;
pub mod message;
pub mod method;

pub use error::{ChannelError, Result};
pub use event::{
    EventChannel, EventSink, StreamEvent, StreamHandler, Subscription, CANCEL, LISTEN,
};
pub use message::{BasicMessageChannel, MessageResponder};
pub use method::{MethodChannel, Responder};
