use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use hostchan_channel::{BasicMessageChannel, EventChannel, MethodChannel};
use hostchan_codec::{BinaryCodec, JsonCodec, JsonMethodCodec, MethodReply};
use hostchan_messenger::BinaryMessenger;
use serde_json::{json, Value};

use super::countdown::CountdownHandler;
use super::{demo_blob, DemoConfig, ARG_NUM, METHOD_GET, METHOD_NOTIFY, METHOD_SEND};

/// Binds the demo channels and keeps their handles for teardown.
///
/// The counter service answers `send` by storing the numeric argument and
/// `get` by returning `counter + n`; a fresh host answers `get {n: 5}`
/// with 5. Both echo channels reply with the incoming message. Every
/// handled request schedules one delayed push back to the remote side.
pub struct DemoHost {
    method: MethodChannel<JsonMethodCodec>,
    json: BasicMessageChannel<JsonCodec>,
    bytes: BasicMessageChannel<BinaryCodec>,
    countdown: EventChannel<JsonMethodCodec>,
    counter: Rc<Cell<i64>>,
}

impl DemoHost {
    /// Bind every demo channel on `messenger`.
    ///
    /// Must run inside a Tokio `LocalSet`: delayed pushes are scheduled
    /// with `spawn_local`.
    pub fn bind(messenger: Rc<dyn BinaryMessenger>, config: DemoConfig) -> Self {
        let counter = Rc::new(Cell::new(0i64));

        let method = MethodChannel::new(
            Rc::clone(&messenger),
            config.method_channel.clone(),
            JsonMethodCodec,
        );
        bind_counter_service(&method, Rc::clone(&counter), config.push_delay);

        let json = BasicMessageChannel::new(
            Rc::clone(&messenger),
            config.json_channel.clone(),
            JsonCodec,
        );
        bind_json_echo(&json, Rc::clone(&counter), config.push_delay);

        let bytes = BasicMessageChannel::new(
            Rc::clone(&messenger),
            config.byte_channel.clone(),
            BinaryCodec,
        );
        bind_byte_echo(&bytes, config.push_delay, config.byte_push_len);

        let countdown = EventChannel::new(
            Rc::clone(&messenger),
            config.countdown_channel.clone(),
            JsonMethodCodec,
        );
        countdown.set_stream_handler(CountdownHandler::new(
            config.countdown_ticks,
            config.countdown_interval,
        ));

        Self {
            method,
            json,
            bytes,
            countdown,
            counter,
        }
    }

    /// Current session counter (last value stored via `send`).
    pub fn counter(&self) -> i64 {
        self.counter.get()
    }

    /// Detach every demo channel. Idempotent.
    pub fn close(&self) {
        self.method.close();
        self.json.close();
        self.bytes.close();
        self.countdown.close();
    }
}

impl Drop for DemoHost {
    fn drop(&mut self) {
        self.close();
    }
}

fn arg_num(arguments: &Option<Value>) -> Option<i64> {
    arguments.as_ref()?.get(ARG_NUM)?.as_i64()
}

fn bind_counter_service(
    channel: &MethodChannel<JsonMethodCodec>,
    counter: Rc<Cell<i64>>,
    push_delay: Duration,
) {
    let outbound = channel.clone();
    channel.set_method_handler(move |call, responder| match call.method.as_str() {
        METHOD_SEND => {
            let Some(n) = arg_num(&call.arguments) else {
                responder.error("malformed", Some("missing numeric \"n\" argument"), None);
                return;
            };
            counter.set(n);
            tracing::debug!(n, "counter stored");
            responder.success(Some(json!(n)));
            schedule_notify(outbound.clone(), Rc::clone(&counter), push_delay);
        }
        METHOD_GET => {
            let Some(n) = arg_num(&call.arguments) else {
                responder.error("malformed", Some("missing numeric \"n\" argument"), None);
                return;
            };
            responder.success(Some(json!(counter.get() + n)));
            schedule_notify(outbound.clone(), Rc::clone(&counter), push_delay);
        }
        _ => responder.not_implemented(),
    });
}

fn schedule_notify(
    channel: MethodChannel<JsonMethodCodec>,
    counter: Rc<Cell<i64>>,
    delay: Duration,
) {
    tokio::task::spawn_local(async move {
        tokio::time::sleep(delay).await;
        let arguments = json!({ ARG_NUM: counter.get() });
        let sent = channel.invoke_with_reply(METHOD_NOTIFY, Some(arguments), |outcome| {
            match outcome {
                Ok(MethodReply::Success(ack)) => tracing::debug!(?ack, "notify acknowledged"),
                Ok(MethodReply::Error(error)) => {
                    tracing::debug!(code = %error.code, "notify rejected");
                }
                Ok(MethodReply::NotImplemented) => {
                    tracing::debug!("notify not implemented on remote side");
                }
                Err(err) => tracing::warn!(error = %err, "notify reply failed to decode"),
            }
        });
        if let Err(err) = sent {
            tracing::warn!(error = %err, "failed sending notify");
        }
    });
}

fn bind_json_echo(
    channel: &BasicMessageChannel<JsonCodec>,
    counter: Rc<Cell<i64>>,
    push_delay: Duration,
) {
    let outbound = channel.clone();
    channel.set_message_handler(move |message, responder| {
        match message.as_ref().and_then(|m| m.get(ARG_NUM)).and_then(Value::as_i64) {
            Some(n) => tracing::debug!(n, "json message received"),
            None => tracing::debug!("json message without \"n\" field"),
        }
        responder.reply(message);

        let channel = outbound.clone();
        let counter = Rc::clone(&counter);
        tokio::task::spawn_local(async move {
            tokio::time::sleep(push_delay).await;
            let message = json!({ ARG_NUM: counter.get() });
            let sent = channel.send_with_reply(&message, |outcome| match outcome {
                Ok(ack) => tracing::debug!(?ack, "json push acknowledged"),
                Err(err) => tracing::warn!(error = %err, "json push ack failed to decode"),
            });
            if let Err(err) = sent {
                tracing::warn!(error = %err, "failed sending json push");
            }
        });
    });
}

fn bind_byte_echo(
    channel: &BasicMessageChannel<BinaryCodec>,
    push_delay: Duration,
    push_len: usize,
) {
    let outbound = channel.clone();
    channel.set_message_handler(move |message, responder| {
        tracing::debug!(
            size = message.as_ref().map_or(0, Bytes::len),
            "byte message received"
        );
        responder.reply(message);

        let channel = outbound.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(push_delay).await;
            let blob = demo_blob(push_len);
            let sent = channel.send_with_reply(&blob, |outcome| match outcome {
                Ok(ack) => {
                    tracing::debug!(size = ack.as_ref().map_or(0, Bytes::len), "byte push acknowledged");
                }
                Err(err) => tracing::warn!(error = %err, "byte push ack failed to decode"),
            });
            if let Err(err) = sent {
                tracing::warn!(error = %err, "failed sending byte push");
            }
        });
    });
}
