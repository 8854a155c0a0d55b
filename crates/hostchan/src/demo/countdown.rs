use std::time::Duration;

use hostchan_channel::{EventSink, StreamHandler};
use hostchan_codec::{JsonMethodCodec, RemoteError};
use serde_json::{json, Value};

use super::ARG_FROM;

/// Emits a finite countdown on a fixed cadence, then end-of-stream.
///
/// A countdown of N ticks emits exactly N decrementing values, N-1 down
/// to 0, one per interval. Listen arguments may carry `{"from": k}` to
/// override the configured tick count. Cancellation is cooperative: the
/// emission task observes the retired sink and stops.
pub struct CountdownHandler {
    ticks: u32,
    interval: Duration,
}

impl CountdownHandler {
    pub fn new(ticks: u32, interval: Duration) -> Self {
        Self { ticks, interval }
    }
}

impl StreamHandler<JsonMethodCodec> for CountdownHandler {
    fn on_listen(
        &self,
        arguments: Option<Value>,
        sink: EventSink<JsonMethodCodec>,
    ) -> Result<(), RemoteError<Value>> {
        let from = match arguments.as_ref().and_then(|a| a.get(ARG_FROM)) {
            None => self.ticks,
            Some(value) => match value.as_u64() {
                Some(n) if n <= u64::from(u32::MAX) => n as u32,
                _ => {
                    return Err(RemoteError::new("malformed")
                        .with_message("\"from\" must be a non-negative integer"))
                }
            },
        };

        let interval = self.interval;
        tokio::task::spawn_local(async move {
            for remaining in (0..from).rev() {
                tokio::time::sleep(interval).await;
                if !sink.is_live() {
                    return;
                }
                sink.success(json!(remaining));
            }
            sink.end_of_stream();
        });
        Ok(())
    }

    fn on_cancel(&self, _arguments: Option<Value>) {
        // The emission task stops on its own once the sink is retired.
    }
}
