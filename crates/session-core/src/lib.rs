//! session-core
//!
//! Pure real-time session logic for the card game client:
//! - connection lifecycle and reconnect bookkeeping
//! - subscription registry that survives reconnects
//! - publish gateway
//! - session state store (status + last game snapshot)
//! - typed game intents and feed
//! - the card pool for local practice hands
//!
//! No I/O happens here. The network plugs in through [`Transport`] and
//! reports back through [`Session::handle_event`].

pub mod status;
pub mod config;
pub mod messages;
pub mod error;
pub mod transport;
pub mod listeners;
pub mod registry;
pub mod connection;
pub mod publish;
pub mod session;
pub mod store;
pub mod game;
pub mod deck;

pub use status::ConnectionStatus;
pub use config::{ConnectionOptions, DEFAULT_ENDPOINT, IDENTITY_HEADER};

pub use messages::{
    Body,
    Headers,
    InboundFrame,
    Message,
    OutboundMessage,
    Payload,
};

pub use error::SessionError;
pub use transport::{ConnectionId, Connector, Transport, TransportEvent};
pub use listeners::{ListenerHandle, Listeners};
pub use registry::{SubscriptionKey, SubscriptionRegistry};
pub use connection::ConnectionInfo;
pub use session::{Session, Subscription};
pub use store::{SessionStore, SnapshotSink, StoreOptions};
pub use game::{GameEvent, GameFeed, GameIntents, GameSnapshot};
