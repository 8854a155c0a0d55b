use std::rc::Rc;

use hostchan_codec::{MethodCall, MethodCodec, MethodReply, RemoteError};
use hostchan_messenger::{BinaryHandler, BinaryMessenger, BinaryReply};

use crate::error::{ChannelError, Result};

/// Request-reply adapter over one named conduit.
///
/// Incoming calls are decoded with the channel's method codec and handed to
/// the attached handler together with a one-shot [`Responder`]. Outgoing
/// invocations are fire-and-forget; replies arrive through an async
/// callback, never by blocking.
pub struct MethodChannel<C: MethodCodec> {
    messenger: Rc<dyn BinaryMessenger>,
    name: String,
    codec: Rc<C>,
}

impl<C: MethodCodec> Clone for MethodChannel<C> {
    fn clone(&self) -> Self {
        Self {
            messenger: Rc::clone(&self.messenger),
            name: self.name.clone(),
            codec: Rc::clone(&self.codec),
        }
    }
}

impl<C: MethodCodec + 'static> MethodChannel<C> {
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

    /// Attach the request handler, replacing any previous one.
    ///
    /// Unknown methods are the handler's to resolve: call
    /// [`Responder::not_implemented`] for anything unrecognized. Calls that
    /// fail to decode never reach the handler; they are answered with an
    /// error reply carrying the code `"malformed"`.
    pub fn set_method_handler<H>(&self, handler: H)
    where
        H: Fn(MethodCall<C::Value>, Responder<C>) + 'static,
    {
        let codec = Rc::clone(&self.codec);
        let name = self.name.clone();
        let binary: BinaryHandler = Rc::new(move |payload, reply| {
            let responder = Responder {
                codec: Rc::clone(&codec),
                reply,
            };
            let Some(payload) = payload else {
                tracing::warn!(channel = %name, "method call with empty payload");
                responder.error("malformed", Some("empty method call payload"), None);
                return;
            };
            match codec.decode_call(payload.as_ref()) {
                Ok(call) => handler(call, responder),
                Err(err) => {
                    tracing::warn!(channel = %name, error = %err, "malformed method call");
                    responder.error("malformed", Some(&err.to_string()), None);
                }
            }
        });
        self.messenger.set_handler(&self.name, Some(binary));
    }

    /// Invoke a method on the remote side, discarding any reply.
    pub fn invoke(&self, method: &str, arguments: Option<C::Value>) -> Result<()> {
        let payload = self.codec.encode_call(&MethodCall::new(method, arguments))?;
        self.messenger.send(&self.name, Some(payload), None);
        Ok(())
    }

    /// Invoke a method on the remote side; `on_reply` fires exactly once.
    ///
    /// An empty reply payload maps to [`MethodReply::NotImplemented`]; a
    /// reply that fails to decode surfaces as `Err`.
    pub fn invoke_with_reply<F>(
        &self,
        method: &str,
        arguments: Option<C::Value>,
        on_reply: F,
    ) -> Result<()>
    where
        F: FnOnce(Result<MethodReply<C::Value>>) + 'static,
    {
        let payload = self.codec.encode_call(&MethodCall::new(method, arguments))?;
        let codec = Rc::clone(&self.codec);
        let reply: BinaryReply = Box::new(move |payload| {
            let outcome = match payload {
                None => Ok(MethodReply::NotImplemented),
                Some(bytes) => codec
                    .decode_reply(bytes.as_ref())
                    .map_err(ChannelError::from),
            };
            on_reply(outcome);
        });
        self.messenger.send(&self.name, Some(payload), Some(reply));
        Ok(())
    }

    /// Detach the handler. Idempotent; never fails.
    pub fn close(&self) {
        self.messenger.set_handler(&self.name, None);
    }
}

/// One-shot reply surface handed to method handlers.
///
/// Consumed by use, so a handler can produce at most one reply per request.
pub struct Responder<C: MethodCodec> {
    codec: Rc<C>,
    reply: BinaryReply,
}

impl<C: MethodCodec> Responder<C> {
    pub fn success(self, value: Option<C::Value>) {
        match self.codec.encode_success(value.as_ref()) {
            Ok(payload) => (self.reply)(Some(payload)),
            Err(err) => {
                tracing::warn!(error = %err, "failed encoding success reply");
                (self.reply)(None);
            }
        }
    }

    pub fn error(self, code: &str, message: Option<&str>, details: Option<C::Value>) {
        let mut error = RemoteError::new(code);
        if let Some(message) = message {
            error = error.with_message(message);
        }
        if let Some(details) = details {
            error = error.with_details(details);
        }
        match self.codec.encode_error(&error) {
            Ok(payload) => (self.reply)(Some(payload)),
            Err(err) => {
                tracing::warn!(error = %err, "failed encoding error reply");
                (self.reply)(None);
            }
        }
    }

    pub fn not_implemented(self) {
        (self.reply)(None);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use bytes::Bytes;
    use hostchan_codec::JsonMethodCodec;
    use hostchan_messenger::{pair, PairMessenger};
    use serde_json::json;

    use super::*;

    fn channels(name: &str) -> (MethodChannel<JsonMethodCodec>, MethodChannel<JsonMethodCodec>) {
        let (host, remote) = pair();
        (on(host, name), on(remote, name))
    }

    fn on(endpoint: PairMessenger, name: &str) -> MethodChannel<JsonMethodCodec> {
        MethodChannel::new(Rc::new(endpoint), name, JsonMethodCodec)
    }

    fn collect_replies(
        channel: &MethodChannel<JsonMethodCodec>,
        method: &str,
        arguments: Option<serde_json::Value>,
    ) -> Vec<MethodReply<serde_json::Value>> {
        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&replies);
        channel
            .invoke_with_reply(method, arguments, move |outcome| {
                sink.borrow_mut().push(outcome.expect("reply should decode"));
            })
            .expect("invoke should encode");
        replies.take()
    }

    #[test]
    fn handler_receives_call_and_replies() {
        let (host, remote) = channels("counter");
        host.set_method_handler(|call, responder| {
            assert_eq!(call.method, "get");
            let n = call
                .arguments
                .as_ref()
                .and_then(|a| a.get("n"))
                .and_then(serde_json::Value::as_i64)
                .expect("call should carry n");
            responder.success(Some(json!(n * 2)));
        });

        let replies = collect_replies(&remote, "get", Some(json!({ "n": 21 })));
        assert_eq!(replies, [MethodReply::Success(Some(json!(42)))]);
    }

    #[test]
    fn unknown_method_resolves_as_not_implemented() {
        let (host, remote) = channels("counter");
        host.set_method_handler(|call, responder| match call.method.as_str() {
            "known" => responder.success(None),
            _ => responder.not_implemented(),
        });

        let replies = collect_replies(&remote, "bogus", None);
        assert_eq!(replies, [MethodReply::NotImplemented]);
    }

    #[test]
    fn error_reply_is_surfaced_verbatim() {
        let (host, remote) = channels("counter");
        host.set_method_handler(|_call, responder| {
            responder.error("busy", Some("try later"), Some(json!(3)));
        });

        let replies = collect_replies(&remote, "get", None);
        assert_eq!(
            replies,
            [MethodReply::Error(
                RemoteError::new("busy")
                    .with_message("try later")
                    .with_details(json!(3))
            )]
        );
    }

    #[test]
    fn malformed_call_payload_yields_error_reply() {
        let (host, remote) = pair();
        let channel = on(host, "counter");
        channel.set_method_handler(|_call, _responder| {
            panic!("handler must not see malformed calls");
        });

        let replies = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&replies);
        remote.send(
            "counter",
            Some(Bytes::from_static(b"{broken")),
            Some(Box::new(move |payload| {
                let reply = JsonMethodCodec
                    .decode_reply(payload.expect("error reply expected").as_ref())
                    .expect("reply should decode");
                sink.borrow_mut().push(reply);
            })),
        );

        let replies = replies.take();
        assert_eq!(replies.len(), 1);
        let MethodReply::Error(error) = &replies[0] else {
            panic!("expected an error reply, got {:?}", replies[0]);
        };
        assert_eq!(error.code, "malformed");
    }

    #[test]
    fn empty_call_payload_yields_error_reply() {
        let (host, remote) = pair();
        let channel = on(host, "counter");
        channel.set_method_handler(|_call, _responder| {
            panic!("handler must not see empty calls");
        });

        let code = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&code);
        remote.send(
            "counter",
            None,
            Some(Box::new(move |payload| {
                let reply = JsonMethodCodec
                    .decode_reply(payload.expect("error reply expected").as_ref())
                    .expect("reply should decode");
                if let MethodReply::Error(error) = reply {
                    *sink.borrow_mut() = Some(error.code);
                }
            })),
        );

        assert_eq!(code.borrow().as_deref(), Some("malformed"));
    }

    #[test]
    fn invoke_without_reply_still_dispatches() {
        let (host, remote) = channels("counter");
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        host.set_method_handler(move |call, responder| {
            sink.borrow_mut().push(call.method);
            responder.success(None);
        });

        remote
            .invoke("fire", Some(json!({ "n": 1 })))
            .expect("invoke should encode");

        assert_eq!(calls.borrow().as_slice(), ["fire"]);
    }

    #[test]
    fn malformed_reply_surfaces_as_decode_error() {
        let (host, remote) = pair();
        // A raw handler that answers with bytes no method codec understands.
        host.set_handler(
            "counter",
            Some(Rc::new(|_message, reply| {
                reply(Some(Bytes::from_static(b"not an envelope")));
            })),
        );

        let channel = on(remote, "counter");
        let failed = Rc::new(RefCell::new(false));
        let sink = Rc::clone(&failed);
        channel
            .invoke_with_reply("get", None, move |outcome| {
                *sink.borrow_mut() = matches!(outcome, Err(ChannelError::Codec(_)));
            })
            .expect("invoke should encode");

        assert!(*failed.borrow(), "decode failure should surface as Err");
    }

    #[test]
    fn close_detaches_and_is_idempotent() {
        let (host, remote) = channels("counter");
        host.set_method_handler(|_call, responder| responder.success(None));

        assert_eq!(
            collect_replies(&remote, "get", None),
            [MethodReply::Success(None)]
        );

        host.close();
        host.close();

        assert_eq!(
            collect_replies(&remote, "get", None),
            [MethodReply::NotImplemented]
        );
    }
}
