//! Countdown example — subscribe to the demo countdown stream.
//!
//! Run with:
//!   cargo run --example countdown

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use hostchan::channel::{EventChannel, StreamEvent};
use hostchan::codec::JsonMethodCodec;
use hostchan::demo::{DemoConfig, DemoHost};
use hostchan::messenger::{pair, BinaryMessenger};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&runtime, async {
        let (host_end, remote_end) = pair();
        let host_messenger: Rc<dyn BinaryMessenger> = Rc::new(host_end);
        let remote_messenger: Rc<dyn BinaryMessenger> = Rc::new(remote_end);

        let config = DemoConfig {
            countdown_ticks: 5,
            countdown_interval: Duration::from_millis(100),
            ..DemoConfig::default()
        };
        let countdown_name = config.countdown_channel.clone();
        let _host = DemoHost::bind(host_messenger, config);

        let channel = EventChannel::new(remote_messenger, countdown_name, JsonMethodCodec);
        let done = Rc::new(Cell::new(false));
        let done_flag = Rc::clone(&done);
        let subscription = channel.subscribe(None, move |event| {
            eprintln!("[remote] {event:?}");
            if matches!(event, StreamEvent::Done) {
                done_flag.set(true);
            }
        })?;

        while !done.get() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        subscription.cancel();
        Ok(())
    })
}
