use std::rc::Rc;

use hostchan_codec::MessageCodec;
use hostchan_messenger::{BinaryHandler, BinaryMessenger, BinaryReply};

use crate::error::{ChannelError, Result};

/// Whole-message adapter over one named conduit.
///
/// Unlike [`MethodChannel`](crate::MethodChannel) there is no method
/// dispatch: each message is one codec-encoded value, optionally
/// acknowledged with another.
pub struct BasicMessageChannel<C: MessageCodec> {
    messenger: Rc<dyn BinaryMessenger>,
    name: String,
    codec: Rc<C>,
}

impl<C: MessageCodec> Clone for BasicMessageChannel<C> {
    fn clone(&self) -> Self {
        Self {
            messenger: Rc::clone(&self.messenger),
            name: self.name.clone(),
            codec: Rc::clone(&self.codec),
        }
    }
}

impl<C: MessageCodec + 'static> BasicMessageChannel<C> {
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

    /// Attach the message handler, replacing any previous one.
    ///
    /// An empty incoming payload is delivered as `None`. A payload that
    /// fails to decode never reaches the handler: it is logged and answered
    /// with an empty reply.
    pub fn set_message_handler<H>(&self, handler: H)
    where
        H: Fn(Option<C::Message>, MessageResponder<C>) + 'static,
    {
        let codec = Rc::clone(&self.codec);
        let name = self.name.clone();
        let binary: BinaryHandler = Rc::new(move |payload, reply| {
            let responder = MessageResponder {
                codec: Rc::clone(&codec),
                reply,
            };
            match payload {
                None => handler(None, responder),
                Some(bytes) => match codec.decode_message(bytes.as_ref()) {
                    Ok(message) => handler(Some(message), responder),
                    Err(err) => {
                        tracing::warn!(channel = %name, error = %err, "malformed message payload; dropping");
                        responder.reply(None);
                    }
                },
            }
        });
        self.messenger.set_handler(&self.name, Some(binary));
    }

    /// Send a message, discarding any acknowledgment.
    pub fn send(&self, message: &C::Message) -> Result<()> {
        let payload = self.codec.encode_message(message)?;
        self.messenger.send(&self.name, Some(payload), None);
        Ok(())
    }

    /// Send a message; `on_reply` fires exactly once with the decoded
    /// acknowledgment (`None` when the other side produced no payload).
    pub fn send_with_reply<F>(&self, message: &C::Message, on_reply: F) -> Result<()>
    where
        F: FnOnce(Result<Option<C::Message>>) + 'static,
    {
        let payload = self.codec.encode_message(message)?;
        let codec = Rc::clone(&self.codec);
        let reply: BinaryReply = Box::new(move |payload| {
            let outcome = match payload {
                None => Ok(None),
                Some(bytes) => codec
                    .decode_message(bytes.as_ref())
                    .map(Some)
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

/// One-shot acknowledgment surface handed to message handlers.
pub struct MessageResponder<C: MessageCodec> {
    codec: Rc<C>,
    reply: BinaryReply,
}

impl<C: MessageCodec> MessageResponder<C> {
    /// Acknowledge the message, optionally with a payload.
    pub fn reply(self, message: Option<C::Message>) {
        match message {
            None => (self.reply)(None),
            Some(message) => match self.codec.encode_message(&message) {
                Ok(payload) => (self.reply)(Some(payload)),
                Err(err) => {
                    tracing::warn!(error = %err, "failed encoding message reply");
                    (self.reply)(None);
                }
            },
        }
    }
}
