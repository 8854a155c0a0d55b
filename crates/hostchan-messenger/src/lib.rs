//! The message-transport seam between a host and an embedded UI runtime.
//!
//! Both sides of the boundary exchange byte payloads addressed by channel
//! name. The transport that physically carries the bytes is supplied by the
//! surrounding runtime; this crate defines the seam ([`BinaryMessenger`])
//! and ships an in-process endpoint pair used by demos and tests.
//!
//! This is the lowest layer of hostchan. Everything else builds on top of
//! the [`BinaryMessenger`] trait provided here.

pub mod pair;
pub mod traits;

pub use pair::{pair, PairMessenger, Side};
pub use traits::{BinaryHandler, BinaryMessenger, BinaryReply};
