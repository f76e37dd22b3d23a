//! The session context object.
//!
//! A [`Session`] is the one logical connection of a running client: it
//! owns the connection manager state and the subscription registry, and
//! exposes connect/disconnect, subscribe and publish. It is created by
//! the application's top-level composition and handed to consumers by
//! cloning the handle (clones share state). Everything runs on a single
//! thread; no lock is taken, and no internal borrow is held while user
//! callbacks run, so handlers and listeners may call back into the
//! session freely.
//!
//! Network events reach the session through [`Session::handle_event`],
//! called by whatever drives the transport.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::ConnectionOptions;
use crate::connection::{Connection, ConnectionInfo};
use crate::error::SessionError;
use crate::listeners::{ListenerHandle, SessionListeners};
use crate::messages::{Body, Headers, Message, OutboundMessage};
use crate::publish;
use crate::registry::{Handler, SubscriptionKey, SubscriptionRegistry};
use crate::status::ConnectionStatus;
use crate::transport::{ConnectionId, Connector, TransportEvent};

struct State {
    options: ConnectionOptions,
    connection: Option<Connection>,
    registry: SubscriptionRegistry,
    next_connection_id: u64,
}

struct Inner {
    state: RefCell<State>,
    listeners: SessionListeners,
    connector: Box<dyn Connector>,
}

/// Cheap, cloneable handle to the session.
#[derive(Clone)]
pub struct Session {
    inner: Rc<Inner>,
}

impl Session {
    pub fn new(options: ConnectionOptions, connector: impl Connector + 'static) -> Self {
        Session {
            inner: Rc::new(Inner {
                state: RefCell::new(State {
                    options,
                    connection: None,
                    registry: SubscriptionRegistry::new(),
                    next_connection_id: 1,
                }),
                listeners: SessionListeners::default(),
                connector: Box::new(connector),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Connection manager
    // -------------------------------------------------------------------------

    /// Build the connection object, unless a live one already exists.
    ///
    /// Does not start any network I/O. A previous connection that is not
    /// live is deactivated and replaced; registered subscriptions carry
    /// over to the new connection.
    pub fn initialize(&self, identity: Option<&str>) -> ConnectionInfo {
        let mut state = self.inner.state.borrow_mut();
        let state = &mut *state;

        if let Some(conn) = &state.connection {
            if conn.status().is_connected() {
                debug!(endpoint = %conn.options().endpoint, "already connected; keeping connection");
                return conn.info();
            }
        }

        if let Some(mut old) = state.connection.take() {
            if old.is_active() {
                old.force_stop(ConnectionStatus::Disconnected);
            }
        }
        state.registry.clear_live();

        let id = ConnectionId(state.next_connection_id);
        state.next_connection_id += 1;

        let options = state.options.with_identity(identity);
        let transport = self.inner.connector.open(id, &options);
        debug!(connection = id.0, endpoint = %options.endpoint, "initialized connection");

        let conn = Connection::new(id, options, transport);
        let info = conn.info();
        state.connection = Some(conn);
        info
    }

    /// Begin activation. No-op if connected, connecting, or not initialized.
    pub fn connect(&self) {
        match self.inner.state.borrow_mut().connection.as_mut() {
            Some(conn) => {
                conn.start();
            }
            None => warn!("connect called before initialize"),
        }
    }

    /// Gracefully tear down. No-op if nothing is connected or pending.
    ///
    /// Pending (never activated) subscriptions stay registered and are
    /// activated on the next successful connect.
    pub fn disconnect(&self) {
        let mut state = self.inner.state.borrow_mut();
        let state = &mut *state;
        if let Some(conn) = state.connection.as_mut() {
            if conn.stop() {
                state.registry.clear_live();
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner
            .state
            .borrow()
            .connection
            .as_ref()
            .map(Connection::status)
            .unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.inner.state.borrow().connection.as_ref().map(Connection::info)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner
            .state
            .borrow()
            .connection
            .as_ref()
            .map_or(0, Connection::reconnect_attempts)
    }

    // -------------------------------------------------------------------------
    // Lifecycle listeners
    // -------------------------------------------------------------------------

    pub fn on_connect(&self, f: impl FnMut(&()) + 'static) -> ListenerHandle {
        self.inner.listeners.connect.add(f)
    }

    pub fn on_disconnect(&self, f: impl FnMut(&()) + 'static) -> ListenerHandle {
        self.inner.listeners.disconnect.add(f)
    }

    pub fn on_error(&self, f: impl FnMut(&SessionError) + 'static) -> ListenerHandle {
        self.inner.listeners.error.add(f)
    }

    // -------------------------------------------------------------------------
    // Subscription registry
    // -------------------------------------------------------------------------

    pub fn subscribe<F>(&self, destination: &str, handler: F) -> Subscription
    where
        F: FnMut(&Message) + 'static,
    {
        self.subscribe_with_headers(destination, Headers::new(), handler)
    }

    /// Register interest in `destination`.
    ///
    /// Subscribes on the wire right away if connected; otherwise the
    /// registration waits for the next successful connect. Before
    /// `initialize` this is a no-op and the returned handle does nothing.
    pub fn subscribe_with_headers<F>(&self, destination: &str, headers: Headers, handler: F) -> Subscription
    where
        F: FnMut(&Message) + 'static,
    {
        let mut state = self.inner.state.borrow_mut();
        let state = &mut *state;

        let Some(conn) = state.connection.as_mut() else {
            warn!(%destination, "subscribe called before initialize");
            return Subscription::noop();
        };

        let handler: Handler = Rc::new(RefCell::new(handler));
        let key = state.registry.insert(destination, headers, handler);
        if conn.status().is_connected() {
            state.registry.activate(&key, conn.transport_mut());
        }

        Subscription {
            key: Some(key),
            session: Rc::downgrade(&self.inner),
        }
    }

    /// Registered subscriptions, live or pending.
    pub fn subscription_count(&self) -> usize {
        self.inner.state.borrow().registry.len()
    }

    /// Subscriptions currently open on the wire.
    pub fn live_subscription_count(&self) -> usize {
        self.inner.state.borrow().registry.live_count()
    }

    pub fn subscribed_destinations(&self) -> Vec<String> {
        self.inner.state.borrow().registry.destinations()
    }

    // -------------------------------------------------------------------------
    // Publish gateway
    // -------------------------------------------------------------------------

    pub fn publish(&self, destination: &str, body: impl Into<Body>) -> bool {
        self.publish_message(&OutboundMessage::new(destination, body))
    }

    pub fn publish_with_headers(&self, destination: &str, body: impl Into<Body>, headers: Headers) -> bool {
        self.publish_message(&OutboundMessage::new(destination, body).with_headers(headers))
    }

    /// Serialise `value` to JSON and publish it.
    pub fn publish_json<T: Serialize + ?Sized>(&self, destination: &str, value: &T) -> bool {
        match Body::json(value) {
            Ok(body) => self.publish(destination, body),
            Err(e) => {
                warn!(%destination, error = %e, "cannot publish: body does not serialize");
                false
            }
        }
    }

    pub fn publish_message(&self, message: &OutboundMessage) -> bool {
        let mut state = self.inner.state.borrow_mut();
        publish::publish(state.connection.as_mut(), message)
    }

    // -------------------------------------------------------------------------
    // Transport events
    // -------------------------------------------------------------------------

    /// Apply one transport event from connection `id`.
    ///
    /// Internal state is updated first; listeners and handlers run after
    /// the update is complete. In particular every registered subscription
    /// is back on the wire before `on_connect` listeners run and before the
    /// next event can be handled.
    pub fn handle_event(&self, id: ConnectionId, event: TransportEvent) {
        let mut state = self.inner.state.borrow_mut();
        let state_ref = &mut *state;

        let Some(conn) = state_ref.connection.as_mut().filter(|c| c.id() == id) else {
            debug!(connection = id.0, "dropping event from stale connection");
            return;
        };

        match event {
            TransportEvent::Connected { .. } => {
                if !conn.is_active() {
                    debug!("handshake completed after deactivate; ignored");
                    return;
                }
                conn.on_connected();
                state_ref.registry.reactivate_all(conn.transport_mut());
                drop(state);
                self.inner.listeners.connect.emit(&());
            }
            TransportEvent::Closed { reason } => {
                debug!(?reason, "connection closed");
                if !conn.on_closed() {
                    return;
                }
                state_ref.registry.clear_live();
                drop(state);
                self.inner.listeners.disconnect.emit(&());
            }
            TransportEvent::BrokerError { message, details } => {
                let err = conn.on_broker_error(message, details);
                state_ref.registry.clear_live();
                drop(state);
                self.inner.listeners.error.emit(&err);
            }
            TransportEvent::SocketError { reason } => {
                let err = conn.on_socket_error(reason);
                if !conn.is_active() {
                    state_ref.registry.clear_live();
                }
                drop(state);
                self.inner.listeners.error.emit(&err);
            }
            TransportEvent::Message(frame) => {
                let handlers = state_ref.registry.route(&frame);
                drop(state);

                if handlers.is_empty() {
                    debug!(destination = %frame.destination, "no subscription for message");
                    return;
                }
                trace!(destination = %frame.destination, handlers = handlers.len(), "dispatch");
                let message = Message::from_frame(&frame);
                for handler in handlers {
                    match handler.try_borrow_mut() {
                        Ok(mut f) => f(&message),
                        Err(_) => warn!(destination = %frame.destination, "handler re-entered; message skipped"),
                    }
                }
            }
        }
    }
}

/// Handle to one registered subscription.
///
/// Holds the session weakly: a subscription never keeps a session alive.
/// Dropping the handle leaves the subscription registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping the handle loses the only way to unsubscribe"]
pub struct Subscription {
    key: Option<SubscriptionKey>,
    session: Weak<Inner>,
}

impl Subscription {
    fn noop() -> Self {
        Subscription {
            key: None,
            session: Weak::new(),
        }
    }

    /// Remove the registration and tear down its live subscription.
    ///
    /// Safe to call any number of times.
    pub fn unsubscribe(&self) {
        let Some(key) = &self.key else {
            return;
        };
        let Some(inner) = self.session.upgrade() else {
            return;
        };

        let mut state = inner.state.borrow_mut();
        let state = &mut *state;
        if let Some(live_id) = state.registry.remove(key) {
            if let Some(conn) = state.connection.as_mut() {
                if conn.status().is_connected() {
                    conn.transport_mut().unsubscribe(&live_id);
                }
            }
        }
    }

    /// Whether the registration still exists.
    pub fn is_registered(&self) -> bool {
        match (&self.key, self.session.upgrade()) {
            (Some(key), Some(inner)) => inner.state.borrow().registry.contains(key),
            _ => false,
        }
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.key.as_ref()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}
