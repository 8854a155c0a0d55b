use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;

use crate::traits::{BinaryHandler, BinaryMessenger, BinaryReply};

/// Which end of the conduit an endpoint speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The platform host.
    Host,
    /// The embedded UI runtime.
    Remote,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Host => Side::Remote,
            Side::Remote => Side::Host,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Side::Host => "host",
            Side::Remote => "remote",
        }
    }
}

#[derive(Default)]
struct RouteTable {
    host: HashMap<String, BinaryHandler>,
    remote: HashMap<String, BinaryHandler>,
}

impl RouteTable {
    fn side(&self, side: Side) -> &HashMap<String, BinaryHandler> {
        match side {
            Side::Host => &self.host,
            Side::Remote => &self.remote,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut HashMap<String, BinaryHandler> {
        match side {
            Side::Host => &mut self.host,
            Side::Remote => &mut self.remote,
        }
    }
}

/// One endpoint of an in-process messenger pair.
///
/// Dispatch is synchronous and single-threaded: a send invokes the handler
/// bound on the other endpoint before returning. Handlers may re-enter the
/// messenger (send, rebind, detach) from within the callback.
#[derive(Clone)]
pub struct PairMessenger {
    routes: Rc<RefCell<RouteTable>>,
    side: Side,
}

/// Create a linked host/remote endpoint pair sharing one route table.
pub fn pair() -> (PairMessenger, PairMessenger) {
    let routes = Rc::new(RefCell::new(RouteTable::default()));
    (
        PairMessenger {
            routes: Rc::clone(&routes),
            side: Side::Host,
        },
        PairMessenger {
            routes,
            side: Side::Remote,
        },
    )
}

impl PairMessenger {
    /// Which side this endpoint speaks for.
    pub fn side(&self) -> Side {
        self.side
    }
}

impl BinaryMessenger for PairMessenger {
    fn send(&self, channel: &str, message: Option<Bytes>, reply: Option<BinaryReply>) {
        // Clone the handler out before invoking so the borrow is released
        // and the handler may re-enter the messenger.
        let handler = self
            .routes
            .borrow()
            .side(self.side.other())
            .get(channel)
            .cloned();

        let reply: BinaryReply = match reply {
            Some(reply) => reply,
            None => Box::new(|_| {}),
        };

        match handler {
            Some(handler) => {
                tracing::trace!(
                    channel,
                    from = self.side.label(),
                    size = message.as_ref().map_or(0, Bytes::len),
                    "delivering message"
                );
                handler(message, reply);
            }
            None => {
                tracing::debug!(
                    channel,
                    from = self.side.label(),
                    "no handler bound; replying empty"
                );
                reply(None);
            }
        }
    }

    fn set_handler(&self, channel: &str, handler: Option<BinaryHandler>) {
        let mut routes = self.routes.borrow_mut();
        let table = routes.side_mut(self.side);
        match handler {
            Some(handler) => {
                if table.insert(channel.to_string(), handler).is_some() {
                    tracing::debug!(channel, side = self.side.label(), "handler replaced");
                } else {
                    tracing::debug!(channel, side = self.side.label(), "handler bound");
                }
            }
            None => {
                if table.remove(channel).is_some() {
                    tracing::debug!(channel, side = self.side.label(), "handler detached");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    fn collect_reply(slot: Rc<RefCell<Option<Option<Bytes>>>>) -> BinaryReply {
        Box::new(move |payload| {
            *slot.borrow_mut() = Some(payload);
        })
    }

    #[test]
    fn send_reaches_handler_on_other_side() {
        let (host, remote) = pair();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        remote.set_handler(
            "x",
            Some(Rc::new(move |message, reply| {
                sink.borrow_mut().push(message);
                reply(None);
            })),
        );

        host.send("x", Some(Bytes::from_static(b"ping")), None);

        assert_eq!(seen.borrow().as_slice(), [Some(Bytes::from_static(b"ping"))]);
    }

    #[test]
    fn reply_flows_back_to_sender() {
        let (host, remote) = pair();
        remote.set_handler(
            "x",
            Some(Rc::new(|message, reply| {
                reply(message);
            })),
        );

        let got = Rc::new(RefCell::new(None));
        host.send(
            "x",
            Some(Bytes::from_static(b"echo")),
            Some(collect_reply(Rc::clone(&got))),
        );

        assert_eq!(
            got.borrow().clone(),
            Some(Some(Bytes::from_static(b"echo")))
        );
    }

    #[test]
    fn unbound_channel_replies_empty() {
        let (host, _remote) = pair();
        let got = Rc::new(RefCell::new(None));
        host.send(
            "nowhere",
            Some(Bytes::from_static(b"lost")),
            Some(collect_reply(Rc::clone(&got))),
        );

        assert_eq!(got.borrow().clone(), Some(None));
    }

    #[test]
    fn sides_have_independent_tables() {
        let (host, remote) = pair();
        let host_hits = Rc::new(Cell::new(0u32));
        let hits = Rc::clone(&host_hits);
        // A handler bound on the host side must not catch host-originated sends.
        host.set_handler(
            "x",
            Some(Rc::new(move |_message, reply| {
                hits.set(hits.get() + 1);
                reply(None);
            })),
        );

        let got = Rc::new(RefCell::new(None));
        host.send("x", None, Some(collect_reply(Rc::clone(&got))));
        assert_eq!(host_hits.get(), 0);
        assert_eq!(got.borrow().clone(), Some(None));

        remote.send("x", None, None);
        assert_eq!(host_hits.get(), 1);
    }

    #[test]
    fn rebinding_replaces_previous_handler() {
        let (host, remote) = pair();
        let first = Rc::new(Cell::new(0u32));
        let second = Rc::new(Cell::new(0u32));

        let hits = Rc::clone(&first);
        remote.set_handler(
            "x",
            Some(Rc::new(move |_m, reply| {
                hits.set(hits.get() + 1);
                reply(None);
            })),
        );
        let hits = Rc::clone(&second);
        remote.set_handler(
            "x",
            Some(Rc::new(move |_m, reply| {
                hits.set(hits.get() + 1);
                reply(None);
            })),
        );

        host.send("x", None, None);

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn detach_is_idempotent() {
        let (host, remote) = pair();
        remote.set_handler("x", Some(Rc::new(|_m, reply| reply(None))));
        remote.set_handler("x", None);
        remote.set_handler("x", None);

        let got = Rc::new(RefCell::new(None));
        host.send("x", None, Some(collect_reply(Rc::clone(&got))));
        assert_eq!(got.borrow().clone(), Some(None));
    }

    #[test]
    fn handler_may_reenter_the_messenger() {
        let (host, remote) = pair();
        let relayed = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&relayed);
        host.set_handler(
            "relay",
            Some(Rc::new(move |message, reply| {
                sink.borrow_mut().push(message);
                reply(None);
            })),
        );

        let back = remote.clone();
        remote.set_handler(
            "x",
            Some(Rc::new(move |message, reply| {
                back.send("relay", message, None);
                reply(None);
            })),
        );

        host.send("x", Some(Bytes::from_static(b"hop")), None);

        assert_eq!(
            relayed.borrow().as_slice(),
            [Some(Bytes::from_static(b"hop"))]
        );
    }
}
