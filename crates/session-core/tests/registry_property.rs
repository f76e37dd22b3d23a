// crates/session-core/tests/registry_property.rs
//
// Random interleavings of subscribe / unsubscribe with connect / drop
// cycles. After every handshake the number of live transport-level
// subscriptions equals the number of registrations still held, and the
// transport has exactly that many open.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;
use session_core::{
    ConnectionId, ConnectionOptions, Headers, OutboundMessage, Session, Subscription, Transport,
    TransportEvent,
};

/// What the broker side would hold for the current connection.
#[derive(Default)]
struct Wire {
    open: HashSet<String>,
    subscribed: usize,
    unsubscribed: usize,
    /// Unsubscribes naming an id that is not open.
    unknown: usize,
}

struct CountingTransport {
    wire: Rc<RefCell<Wire>>,
}

impl Transport for CountingTransport {
    fn activate(&mut self) {}
    fn deactivate(&mut self) {
        self.wire.borrow_mut().open.clear();
    }
    fn subscribe(&mut self, id: &str, _destination: &str, _headers: &Headers) {
        let mut wire = self.wire.borrow_mut();
        wire.subscribed += 1;
        wire.open.insert(id.to_string());
    }
    fn unsubscribe(&mut self, id: &str) {
        let mut wire = self.wire.borrow_mut();
        wire.unsubscribed += 1;
        if !wire.open.remove(id) {
            wire.unknown += 1;
        }
    }
    fn send(&mut self, _message: &OutboundMessage) {}
}

#[derive(Debug, Clone)]
enum Op {
    Subscribe(u8),
    Unsubscribe(usize),
    UnsubscribeTwice(usize),
    Handshake,
    Drop,
    Disconnect,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..4).prop_map(Op::Subscribe),
        2 => any::<usize>().prop_map(Op::Unsubscribe),
        1 => any::<usize>().prop_map(Op::UnsubscribeTwice),
        2 => Just(Op::Handshake),
        1 => Just(Op::Drop),
        1 => Just(Op::Disconnect),
    ]
}

proptest! {
    #[test]
    fn live_count_matches_registrations_after_every_handshake(ops in prop::collection::vec(op(), 1..60)) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let w = wire.clone();
        let session = Session::new(
            ConnectionOptions::default(),
            move |_: ConnectionId, _: &ConnectionOptions| -> Box<dyn Transport> {
                Box::new(CountingTransport { wire: w.clone() })
            },
        );
        let id = session.initialize(None).id;

        let mut held: Vec<Subscription> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe(n) => {
                    held.push(session.subscribe(&format!("/topic/t{n}"), |_| {}));
                }
                Op::Unsubscribe(i) | Op::UnsubscribeTwice(i) if !held.is_empty() => {
                    let sub = held.remove(i % held.len());
                    let before = wire.borrow().unsubscribed;
                    sub.unsubscribe();
                    if matches!(op, Op::UnsubscribeTwice(_)) {
                        sub.unsubscribe();
                    }
                    prop_assert!(wire.borrow().unsubscribed - before <= 1);
                }
                Op::Unsubscribe(_) | Op::UnsubscribeTwice(_) => {}
                Op::Handshake => {
                    session.connect();
                    session.handle_event(id, TransportEvent::Connected { headers: Headers::new() });
                    if session.is_connected() {
                        prop_assert_eq!(session.live_subscription_count(), held.len());
                        prop_assert_eq!(wire.borrow().open.len(), held.len());
                    }
                }
                Op::Drop => {
                    session.handle_event(id, TransportEvent::Closed { reason: None });
                    // The broker forgets subscriptions with the connection.
                    wire.borrow_mut().open.clear();
                    prop_assert_eq!(session.live_subscription_count(), 0);
                }
                Op::Disconnect => {
                    session.disconnect();
                    prop_assert_eq!(session.live_subscription_count(), 0);
                    prop_assert!(wire.borrow().open.is_empty());
                }
            }
            prop_assert_eq!(session.subscription_count(), held.len());
            prop_assert_eq!(wire.borrow().unknown, 0);
            if session.is_connected() {
                prop_assert_eq!(wire.borrow().open.len(), session.live_subscription_count());
            }
        }
    }
}
