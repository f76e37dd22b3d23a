//! Session state store.
//!
//! Component-external state the UI layer reads reactively: the current
//! connection status and the last known game snapshot. Both are published
//! through `tokio::sync::watch` channels, so any number of observers can
//! hold a receiver and wait for changes.
//!
//! Lifecycle is tied to the owning scope: [`SessionStore::mount`]
//! initializes the session and wires the lifecycle listeners, and dropping
//! the store disconnects unconditionally and removes those listeners.

use std::rc::Rc;

use tokio::sync::watch;
use tracing::debug;

use crate::connection::ConnectionInfo;
use crate::game::GameSnapshot;
use crate::listeners::ListenerHandle;
use crate::session::Session;
use crate::status::ConnectionStatus;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Call `connect()` right after mounting.
    pub auto_connect: bool,
    /// Per-session identity sent with the handshake.
    pub identity: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            auto_connect: true,
            identity: None,
        }
    }
}

/// Write side of the snapshot channel, handed to message handlers.
#[derive(Clone)]
pub struct SnapshotSink {
    tx: Rc<watch::Sender<Option<GameSnapshot>>>,
}

impl SnapshotSink {
    pub fn record(&self, snapshot: GameSnapshot) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

pub struct SessionStore {
    session: Session,
    info: ConnectionInfo,
    status: Rc<watch::Sender<ConnectionStatus>>,
    snapshot: SnapshotSink,
    listeners: Vec<ListenerHandle>,
}

impl SessionStore {
    /// Initialize `session` and start tracking its status.
    pub fn mount(session: Session, options: StoreOptions) -> Self {
        let info = session.initialize(options.identity.as_deref());

        let (status_tx, _) = watch::channel(session.status());
        let status = Rc::new(status_tx);
        let (snapshot_tx, _) = watch::channel(None);
        let snapshot = SnapshotSink {
            tx: Rc::new(snapshot_tx),
        };

        let mut listeners = Vec::with_capacity(3);

        let tx = status.clone();
        listeners.push(session.on_connect(move |_| {
            tx.send_replace(ConnectionStatus::Connected);
        }));

        // A close that follows a reported error keeps showing the error.
        let tx = status.clone();
        listeners.push(session.on_disconnect(move |_| {
            tx.send_if_modified(|s| {
                if *s == ConnectionStatus::Error {
                    false
                } else {
                    *s = ConnectionStatus::Disconnected;
                    true
                }
            });
        }));

        let tx = status.clone();
        listeners.push(session.on_error(move |_| {
            tx.send_replace(ConnectionStatus::Error);
        }));

        let store = SessionStore {
            session,
            info,
            status,
            snapshot,
            listeners,
        };

        if options.auto_connect {
            store.connect();
        }
        store
    }

    pub fn connect(&self) {
        self.session.connect();
        self.sync_status();
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
        self.sync_status();
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.snapshot.tx.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<GameSnapshot>> {
        self.snapshot.tx.subscribe()
    }

    pub fn record_snapshot(&self, snapshot: GameSnapshot) {
        self.snapshot.record(snapshot);
    }

    pub fn snapshot_sink(&self) -> SnapshotSink {
        self.snapshot.clone()
    }

    /// The connection as it was when the store was mounted.
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn sync_status(&self) {
        let now = self.session.status();
        self.status.send_if_modified(|s| {
            if *s == now {
                false
            } else {
                *s = now;
                true
            }
        });
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        debug!("unmounting session store");
        for handle in &mut self.listeners {
            handle.remove();
        }
        self.session.disconnect();
    }
}
