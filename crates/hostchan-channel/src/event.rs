use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hostchan_codec::{MethodCall, MethodCodec, MethodReply, RemoteError};
use hostchan_messenger::{BinaryHandler, BinaryMessenger, BinaryReply};

use crate::error::Result;

/// Control method that opens a stream subscription.
pub const LISTEN: &str = "listen";
/// Control method that tears a subscription down.
pub const CANCEL: &str = "cancel";

/// Receives stream lifecycle callbacks for an [`EventChannel`].
///
/// Methods take `&self`; handlers that carry state use interior
/// mutability. The sink handed to `on_listen` is already retired by the
/// time `on_cancel` runs.
pub trait StreamHandler<C: MethodCodec> {
    /// A listener subscribed. Emit through `sink`, which stays valid after
    /// this call returns. Returning `Err` rejects the subscription and the
    /// error is surfaced to the listener verbatim.
    fn on_listen(
        &self,
        arguments: Option<C::Value>,
        sink: EventSink<C>,
    ) -> std::result::Result<(), RemoteError<C::Value>>;

    /// The listener unsubscribed.
    fn on_cancel(&self, arguments: Option<C::Value>);
}

struct SinkShared<C: MethodCodec> {
    messenger: Rc<dyn BinaryMessenger>,
    name: String,
    codec: Rc<C>,
    live: Cell<bool>,
}

/// Emits events toward the subscribed listener.
///
/// Cheap to clone; all clones share one subscription. After cancellation
/// or [`end_of_stream`](EventSink::end_of_stream) further emissions are
/// dropped.
pub struct EventSink<C: MethodCodec> {
    shared: Rc<SinkShared<C>>,
}

impl<C: MethodCodec> Clone for EventSink<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C: MethodCodec> EventSink<C> {
    /// Push a value to the listener.
    pub fn success(&self, value: C::Value) {
        if !self.shared.live.get() {
            tracing::trace!(channel = %self.shared.name, "dropping event after stream ended");
            return;
        }
        match self.shared.codec.encode_success(Some(&value)) {
            Ok(payload) => self
                .shared
                .messenger
                .send(&self.shared.name, Some(payload), None),
            Err(err) => {
                tracing::warn!(channel = %self.shared.name, error = %err, "failed encoding stream event");
            }
        }
    }

    /// Push an error event to the listener. The stream stays open.
    pub fn error(&self, code: &str, message: Option<&str>, details: Option<C::Value>) {
        if !self.shared.live.get() {
            tracing::trace!(channel = %self.shared.name, "dropping error after stream ended");
            return;
        }
        let mut error = RemoteError::new(code);
        if let Some(message) = message {
            error = error.with_message(message);
        }
        if let Some(details) = details {
            error = error.with_details(details);
        }
        match self.shared.codec.encode_error(&error) {
            Ok(payload) => self
                .shared
                .messenger
                .send(&self.shared.name, Some(payload), None),
            Err(err) => {
                tracing::warn!(channel = %self.shared.name, error = %err, "failed encoding stream error");
            }
        }
    }

    /// Signal the end of the stream and retire the sink.
    ///
    /// Idempotent: only the first call sends the signal.
    pub fn end_of_stream(&self) {
        if !self.shared.live.replace(false) {
            return;
        }
        self.shared.messenger.send(&self.shared.name, None, None);
    }

    /// Whether the listener is still subscribed.
    ///
    /// Producers emitting from scheduled tasks poll this to stop after a
    /// cooperative cancel.
    pub fn is_live(&self) -> bool {
        self.shared.live.get()
    }

    fn retire(&self) {
        self.shared.live.set(false);
    }
}

/// An event delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent<V> {
    /// A value pushed by the emitter (`None` when it pushed null).
    Data(Option<V>),
    /// An error pushed by the emitter; the stream stays open.
    Error(RemoteError<V>),
    /// Explicit end-of-stream. Nothing follows.
    Done,
}

/// Stream adapter: one named conduit, one listener at a time.
///
/// The wire contract reuses method envelopes: `listen`/`cancel` arrive as
/// method calls on the channel's own name, each event is a success or
/// error reply envelope pushed on the same name, and an empty message is
/// the end-of-stream signal.
pub struct EventChannel<C: MethodCodec> {
    messenger: Rc<dyn BinaryMessenger>,
    name: String,
    codec: Rc<C>,
}

impl<C: MethodCodec> Clone for EventChannel<C> {
    fn clone(&self) -> Self {
        Self {
            messenger: Rc::clone(&self.messenger),
            name: self.name.clone(),
            codec: Rc::clone(&self.codec),
        }
    }
}

impl<C: MethodCodec + 'static> EventChannel<C> {
    pub fn new(messenger: Rc<dyn BinaryMessenger>, name: impl Into<String>, codec: C) -> Self {
        Self {
            messenger,
            name: name.into(),
            codec: Rc::new(codec),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the stream handler, replacing any previous one.
    ///
    /// A `listen` while a subscription is active cancels the previous one
    /// first: the name maps to exactly one conduit.
    pub fn set_stream_handler<H>(&self, handler: H)
    where
        H: StreamHandler<C> + 'static,
    {
        let handler = Rc::new(handler);
        let current: Rc<RefCell<Option<EventSink<C>>>> = Rc::new(RefCell::new(None));
        let messenger = Rc::clone(&self.messenger);
        let codec = Rc::clone(&self.codec);
        let name = self.name.clone();

        let binary: BinaryHandler = Rc::new(move |payload, reply| {
            let call = match payload.as_deref().map(|p| codec.decode_call(p)) {
                Some(Ok(call)) => call,
                Some(Err(err)) => {
                    tracing::warn!(channel = %name, error = %err, "malformed stream control call");
                    reply_error(&*codec, reply, RemoteError::new("malformed").with_message(err.to_string()));
                    return;
                }
                None => {
                    tracing::warn!(channel = %name, "empty stream control payload");
                    reply_error(
                        &*codec,
                        reply,
                        RemoteError::new("malformed").with_message("empty stream control payload"),
                    );
                    return;
                }
            };

            match call.method.as_str() {
                LISTEN => {
                    let previous = current.borrow_mut().take();
                    if let Some(previous) = previous {
                        if previous.is_live() {
                            previous.retire();
                            handler.on_cancel(None);
                        }
                    }

                    let sink = EventSink {
                        shared: Rc::new(SinkShared {
                            messenger: Rc::clone(&messenger),
                            name: name.clone(),
                            codec: Rc::clone(&codec),
                            live: Cell::new(true),
                        }),
                    };
                    match handler.on_listen(call.arguments, sink.clone()) {
                        Ok(()) => {
                            *current.borrow_mut() = Some(sink);
                            reply_success(&*codec, reply);
                        }
                        Err(error) => {
                            sink.retire();
                            reply_error(&*codec, reply, error);
                        }
                    }
                }
                CANCEL => {
                    let previous = current.borrow_mut().take();
                    match previous.filter(EventSink::is_live) {
                        Some(previous) => {
                            previous.retire();
                            handler.on_cancel(call.arguments);
                            reply_success(&*codec, reply);
                        }
                        None => reply_error(
                            &*codec,
                            reply,
                            RemoteError::new("no_active_listener")
                                .with_message("cancel without an active stream"),
                        ),
                    }
                }
                other => {
                    tracing::debug!(channel = %name, method = other, "unknown stream control method");
                    reply(None);
                }
            }
        });
        self.messenger.set_handler(&self.name, Some(binary));
    }

    /// Subscribe to the remote emitter.
    ///
    /// Binds the event receiver before sending `listen`, so synchronously
    /// emitted events are not lost. The returned guard cancels on drop.
    pub fn subscribe<F>(&self, arguments: Option<C::Value>, on_event: F) -> Result<Subscription<C>>
    where
        F: Fn(StreamEvent<C::Value>) + 'static,
    {
        let done = Rc::new(Cell::new(false));

        let codec = Rc::clone(&self.codec);
        let name = self.name.clone();
        let done_rx = Rc::clone(&done);
        let binary: BinaryHandler = Rc::new(move |payload, _reply| match payload {
            None => {
                done_rx.set(true);
                on_event(StreamEvent::Done);
            }
            Some(bytes) => match codec.decode_reply(bytes.as_ref()) {
                Ok(MethodReply::Success(value)) => on_event(StreamEvent::Data(value)),
                Ok(MethodReply::Error(error)) => on_event(StreamEvent::Error(error)),
                Ok(MethodReply::NotImplemented) => {}
                Err(err) => {
                    tracing::warn!(channel = %name, error = %err, "malformed stream event; dropping");
                }
            },
        });
        self.messenger.set_handler(&self.name, Some(binary));

        let listen = self.codec.encode_call(&MethodCall::new(LISTEN, arguments))?;
        let ack_channel = self.name.clone();
        let ack_codec = Rc::clone(&self.codec);
        let ack: BinaryReply = Box::new(move |payload| {
            let Some(bytes) = payload else {
                tracing::debug!(channel = %ack_channel, "listen not acknowledged");
                return;
            };
            match ack_codec.decode_reply(bytes.as_ref()) {
                Ok(MethodReply::Error(error)) => {
                    tracing::warn!(channel = %ack_channel, code = %error.code, "listen rejected");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(channel = %ack_channel, error = %err, "malformed listen ack");
                }
            }
        });
        self.messenger.send(&self.name, Some(listen), Some(ack));

        Ok(Subscription {
            messenger: Rc::clone(&self.messenger),
            name: self.name.clone(),
            codec: Rc::clone(&self.codec),
            done,
            cancelled: Cell::new(false),
        })
    }

    /// Detach the handler. Idempotent; never fails.
    pub fn close(&self) {
        self.messenger.set_handler(&self.name, None);
    }
}

/// Guard for an active subscription; cancels on drop.
pub struct Subscription<C: MethodCodec> {
    messenger: Rc<dyn BinaryMessenger>,
    name: String,
    codec: Rc<C>,
    done: Rc<Cell<bool>>,
    cancelled: Cell<bool>,
}

impl<C: MethodCodec> Subscription<C> {
    /// Cancel the subscription and detach the event receiver. Idempotent.
    ///
    /// No `cancel` call goes out if the stream already ended.
    pub fn cancel(&self) {
        if self.cancelled.replace(true) {
            return;
        }
        if !self.done.get() {
            match self.codec.encode_call(&MethodCall::new(CANCEL, None)) {
                Ok(payload) => self.messenger.send(&self.name, Some(payload), None),
                Err(err) => {
                    tracing::warn!(channel = %self.name, error = %err, "failed encoding cancel");
                }
            }
        }
        self.messenger.set_handler(&self.name, None);
    }

    /// Whether the emitter already signalled end-of-stream.
    pub fn is_done(&self) -> bool {
        self.done.get()
    }
}

impl<C: MethodCodec> Drop for Subscription<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn reply_success<C: MethodCodec>(codec: &C, reply: BinaryReply) {
    match codec.encode_success(None) {
        Ok(payload) => reply(Some(payload)),
        Err(err) => {
            tracing::warn!(error = %err, "failed encoding stream control ack");
            reply(None);
        }
    }
}

fn reply_error<C: MethodCodec>(codec: &C, reply: BinaryReply, error: RemoteError<C::Value>) {
    match codec.encode_error(&error) {
        Ok(payload) => reply(Some(payload)),
        Err(err) => {
            tracing::warn!(error = %err, "failed encoding stream control error");
            reply(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use hostchan_codec::JsonMethodCodec;
    use hostchan_messenger::{pair, PairMessenger};
    use serde_json::{json, Value};

    use super::*;

    /// Emits the configured values synchronously on listen, then ends.
    struct BurstHandler {
        values: Vec<i64>,
        cancelled: Rc<Cell<u32>>,
    }

    impl StreamHandler<JsonMethodCodec> for BurstHandler {
        fn on_listen(
            &self,
            _arguments: Option<Value>,
            sink: EventSink<JsonMethodCodec>,
        ) -> std::result::Result<(), RemoteError<Value>> {
            for value in &self.values {
                sink.success(json!(value));
            }
            sink.end_of_stream();
            Ok(())
        }

        fn on_cancel(&self, _arguments: Option<Value>) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    /// Parks the sink so the test can emit after on_listen returned.
    struct ParkedHandler {
        sink: Rc<RefCell<Option<EventSink<JsonMethodCodec>>>>,
        cancelled: Rc<Cell<u32>>,
    }

    impl StreamHandler<JsonMethodCodec> for ParkedHandler {
        fn on_listen(
            &self,
            _arguments: Option<Value>,
            sink: EventSink<JsonMethodCodec>,
        ) -> std::result::Result<(), RemoteError<Value>> {
            *self.sink.borrow_mut() = Some(sink);
            Ok(())
        }

        fn on_cancel(&self, _arguments: Option<Value>) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    /// Rejects every listen.
    struct RejectingHandler;

    impl StreamHandler<JsonMethodCodec> for RejectingHandler {
        fn on_listen(
            &self,
            _arguments: Option<Value>,
            _sink: EventSink<JsonMethodCodec>,
        ) -> std::result::Result<(), RemoteError<Value>> {
            Err(RemoteError::new("denied").with_message("not today"))
        }

        fn on_cancel(&self, _arguments: Option<Value>) {}
    }

    fn on(endpoint: PairMessenger, name: &str) -> EventChannel<JsonMethodCodec> {
        EventChannel::new(Rc::new(endpoint), name, JsonMethodCodec)
    }

    fn collect_events(
        events: &Rc<RefCell<Vec<StreamEvent<Value>>>>,
    ) -> impl Fn(StreamEvent<Value>) + 'static {
        let sink = Rc::clone(events);
        move |event| sink.borrow_mut().push(event)
    }

    #[test]
    fn listen_receives_events_then_done() {
        let (host, remote) = pair();
        let cancelled = Rc::new(Cell::new(0));
        on(host, "stream").set_stream_handler(BurstHandler {
            values: vec![3, 2, 1],
            cancelled: Rc::clone(&cancelled),
        });

        let events = Rc::new(RefCell::new(Vec::new()));
        let sub = on(remote, "stream")
            .subscribe(None, collect_events(&events))
            .expect("subscribe should encode");

        assert_eq!(
            events.take(),
            [
                StreamEvent::Data(Some(json!(3))),
                StreamEvent::Data(Some(json!(2))),
                StreamEvent::Data(Some(json!(1))),
                StreamEvent::Done,
            ]
        );
        assert!(sub.is_done());
        assert_eq!(cancelled.get(), 0);
    }

    #[test]
    fn cancel_retires_sink_and_invokes_on_cancel() {
        let (host, remote) = pair();
        let parked = Rc::new(RefCell::new(None));
        let cancelled = Rc::new(Cell::new(0));
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::clone(&parked),
            cancelled: Rc::clone(&cancelled),
        });

        let events = Rc::new(RefCell::new(Vec::new()));
        let sub = on(remote, "stream")
            .subscribe(None, collect_events(&events))
            .expect("subscribe should encode");

        let sink = parked.borrow().clone().expect("listen should park a sink");
        sink.success(json!(1));
        assert_eq!(events.borrow().len(), 1);

        sub.cancel();
        assert_eq!(cancelled.get(), 1);
        assert!(!sink.is_live());

        // Emissions after cancel are dropped, not delivered.
        sink.success(json!(2));
        sink.end_of_stream();
        assert_eq!(events.take(), [StreamEvent::Data(Some(json!(1)))]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (host, remote) = pair();
        let cancelled = Rc::new(Cell::new(0));
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::new(RefCell::new(None)),
            cancelled: Rc::clone(&cancelled),
        });

        let sub = on(remote, "stream")
            .subscribe(None, |_event| {})
            .expect("subscribe should encode");
        sub.cancel();
        sub.cancel();
        assert_eq!(cancelled.get(), 1);
    }

    #[test]
    fn relisten_cancels_previous_subscription() {
        let (host, remote) = pair();
        let parked = Rc::new(RefCell::new(None));
        let cancelled = Rc::new(Cell::new(0));
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::clone(&parked),
            cancelled: Rc::clone(&cancelled),
        });

        let channel = on(remote, "stream");
        let _first = channel
            .subscribe(None, |_event| {})
            .expect("subscribe should encode");
        let first_sink = parked.borrow().clone().expect("first sink parked");

        let _second = channel
            .subscribe(None, |_event| {})
            .expect("subscribe should encode");
        let second_sink = parked.borrow().clone().expect("second sink parked");

        assert_eq!(cancelled.get(), 1);
        assert!(!first_sink.is_live());
        assert!(second_sink.is_live());
    }

    #[test]
    fn rejected_listen_surfaces_error_envelope() {
        let (host, remote) = pair();
        on(host, "stream").set_stream_handler(RejectingHandler);

        let listen = JsonMethodCodec
            .encode_call(&MethodCall::new(LISTEN, None::<Value>))
            .expect("listen should encode");
        let code = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&code);
        remote.send(
            "stream",
            Some(listen),
            Some(Box::new(move |payload| {
                let reply = JsonMethodCodec
                    .decode_reply(payload.expect("error envelope expected").as_ref())
                    .expect("reply should decode");
                if let MethodReply::Error(error) = reply {
                    *sink.borrow_mut() = Some(error.code);
                }
            })),
        );

        assert_eq!(code.borrow().as_deref(), Some("denied"));
    }

    #[test]
    fn cancel_without_listener_is_an_error() {
        let (host, remote) = pair();
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::new(RefCell::new(None)),
            cancelled: Rc::new(Cell::new(0)),
        });

        let cancel = JsonMethodCodec
            .encode_call(&MethodCall::new(CANCEL, None::<Value>))
            .expect("cancel should encode");
        let code = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&code);
        remote.send(
            "stream",
            Some(cancel),
            Some(Box::new(move |payload| {
                let reply = JsonMethodCodec
                    .decode_reply(payload.expect("error envelope expected").as_ref())
                    .expect("reply should decode");
                if let MethodReply::Error(error) = reply {
                    *sink.borrow_mut() = Some(error.code);
                }
            })),
        );

        assert_eq!(code.borrow().as_deref(), Some("no_active_listener"));
    }

    #[test]
    fn unknown_control_method_is_not_implemented() {
        let (host, remote) = pair();
        on(host, "stream").set_stream_handler(RejectingHandler);

        let call = JsonMethodCodec
            .encode_call(&MethodCall::new("peek", None::<Value>))
            .expect("call should encode");
        let empty = Rc::new(Cell::new(false));
        let sink = Rc::clone(&empty);
        remote.send(
            "stream",
            Some(call),
            Some(Box::new(move |payload| {
                sink.set(payload.is_none());
            })),
        );

        assert!(empty.get(), "unknown control method should reply empty");
    }

    #[test]
    fn end_of_stream_signal_is_sent_once() {
        let (host, remote) = pair();
        let parked = Rc::new(RefCell::new(None));
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::clone(&parked),
            cancelled: Rc::new(Cell::new(0)),
        });

        let events = Rc::new(RefCell::new(Vec::new()));
        let _sub = on(remote, "stream")
            .subscribe(None, collect_events(&events))
            .expect("subscribe should encode");

        let sink = parked.borrow().clone().expect("sink parked");
        sink.end_of_stream();
        sink.end_of_stream();

        assert_eq!(events.take(), [StreamEvent::Done]);
    }

    #[test]
    fn error_events_keep_the_stream_open() {
        let (host, remote) = pair();
        let parked = Rc::new(RefCell::new(None));
        on(host, "stream").set_stream_handler(ParkedHandler {
            sink: Rc::clone(&parked),
            cancelled: Rc::new(Cell::new(0)),
        });

        let events = Rc::new(RefCell::new(Vec::new()));
        let _sub = on(remote, "stream")
            .subscribe(None, collect_events(&events))
            .expect("subscribe should encode");

        let sink = parked.borrow().clone().expect("sink parked");
        sink.error("hiccup", Some("transient"), None);
        sink.success(json!(1));

        assert_eq!(
            events.take(),
            [
                StreamEvent::Error(RemoteError::new("hiccup").with_message("transient")),
                StreamEvent::Data(Some(json!(1))),
            ]
        );
    }
}
