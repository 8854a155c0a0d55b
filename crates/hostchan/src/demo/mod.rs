//! Bilateral demo host.
//!
//! One configurable host wires four conduits: a counter service on a
//! method channel, JSON and byte echo message channels, and a countdown
//! event stream. Every handled request schedules
//! one delayed push back to the remote side — illustrative pacing for the
//! bidirectional flow, not a correctness requirement.
//!
//! Channel names are plain configuration passed at construction; the
//! defaults below are the demo wire contract and must match verbatim on
//! the remote side.

mod countdown;
mod host;

use std::time::Duration;

use bytes::Bytes;

pub use countdown::CountdownHandler;
pub use host::DemoHost;

/// Method: store a counter value on the host.
pub const METHOD_SEND: &str = "send";
/// Method: read a value derived from the stored counter.
pub const METHOD_GET: &str = "get";
/// Method the host invokes on the remote side for delayed pushes.
pub const METHOD_NOTIFY: &str = "notify";
/// Argument key carrying the numeric counter.
pub const ARG_NUM: &str = "n";
/// Listen argument overriding the countdown start.
pub const ARG_FROM: &str = "from";

/// Configuration for the demo host.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Counter service channel name.
    pub method_channel: String,
    /// JSON echo channel name.
    pub json_channel: String,
    /// Byte echo channel name.
    pub byte_channel: String,
    /// Countdown stream channel name.
    pub countdown_channel: String,
    /// Delay before each unsolicited push.
    pub push_delay: Duration,
    /// Countdown length in ticks.
    pub countdown_ticks: u32,
    /// Cadence between countdown events.
    pub countdown_interval: Duration,
    /// Size of the patterned payload pushed on the byte channel.
    pub byte_push_len: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            method_channel: "hostchan.demo/method".to_string(),
            json_channel: "hostchan.demo/json_message".to_string(),
            byte_channel: "hostchan.demo/byte_message".to_string(),
            countdown_channel: "hostchan.demo/countdown".to_string(),
            push_delay: Duration::from_secs(5),
            countdown_ticks: 10,
            countdown_interval: Duration::from_secs(1),
            byte_push_len: 1024,
        }
    }
}

/// Deterministic patterned payload standing in for a bundled asset.
pub fn demo_blob(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
}
