//! Named duplex channels between a host and an embedded UI runtime.
//!
//! hostchan lets a host process register named channels — method-call,
//! basic-message, and event/stream — against a message-transport seam
//! shared with an embedded UI runtime, exchanging JSON/byte payloads and
//! invoking callbacks across the boundary.
//!
//! # Crate Structure
//!
//! - [`messenger`] — the transport seam and an in-process endpoint pair
//! - [`codec`] — message and method-call codecs (binary/string/json/structured)
//! - [`channel`] — the channel adapters built on both
//! - [`demo`] — a bilateral demo host with timer-paced pushes (behind the
//!   `demo` feature)

/// Re-export messenger types.
pub mod messenger {
    pub use hostchan_messenger::*;
}

/// Re-export codec types.
pub mod codec {
    pub use hostchan_codec::*;
}

/// Re-export channel adapter types.
pub mod channel {
    pub use hostchan_channel::*;
}

/// Demo host wiring (requires `demo` feature).
#[cfg(feature = "demo")]
pub mod demo;
