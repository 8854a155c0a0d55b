//! Loopback example — bind the demo host and drive it from the remote side.
//!
//! Run with:
//!   cargo run --example loopback

use std::rc::Rc;
use std::time::Duration;

use hostchan::channel::{BasicMessageChannel, MethodChannel};
use hostchan::codec::{JsonCodec, JsonMethodCodec};
use hostchan::demo::{DemoConfig, DemoHost, ARG_NUM, METHOD_GET, METHOD_NOTIFY, METHOD_SEND};
use hostchan::messenger::{pair, BinaryMessenger};
use serde_json::json;

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
            push_delay: Duration::from_millis(200),
            ..DemoConfig::default()
        };
        let method_name = config.method_channel.clone();
        let json_name = config.json_channel.clone();
        let _host = DemoHost::bind(host_messenger, config);

        // Remote method conduit: drives the counter service and answers
        // the host's delayed notify pushes.
        let method = MethodChannel::new(
            Rc::clone(&remote_messenger),
            method_name,
            JsonMethodCodec,
        );
        method.set_method_handler(|call, responder| match call.method.as_str() {
            METHOD_NOTIFY => {
                eprintln!("[remote] notify push: {:?}", call.arguments);
                responder.success(Some(json!("ack")));
            }
            _ => responder.not_implemented(),
        });

        method.invoke_with_reply(METHOD_SEND, Some(json!({ ARG_NUM: 7 })), |outcome| {
            eprintln!("[remote] send reply: {outcome:?}");
        })?;
        method.invoke_with_reply(METHOD_GET, Some(json!({ ARG_NUM: 5 })), |outcome| {
            eprintln!("[remote] get reply: {outcome:?}");
        })?;

        // JSON echo conduit.
        let echo = BasicMessageChannel::new(Rc::clone(&remote_messenger), json_name, JsonCodec);
        echo.send_with_reply(&json!({ ARG_NUM: 7 }), |outcome| {
            eprintln!("[remote] json echo: {outcome:?}");
        })?;

        // Let the delayed pushes fire before exiting.
        tokio::time::sleep(Duration::from_millis(400)).await;
        Ok(())
    })
}
