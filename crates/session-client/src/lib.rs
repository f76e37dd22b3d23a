//! session-client
//!
//! Networked side of the game session client:
//! - [`network`]  : STOMP over WebSocket transport (`tokio-tungstenite`)
//! - [`config`]   : defaults, TOML file and environment
//! - [`api`]      : plain HTTP helper (leaderboard)
//! - [`identity`] : session id handling
//! - [`nickname`] : leaderboard nickname entry
//! - [`commands`] / [`app`] : the `game-client` console

pub mod config;
pub mod network;
pub mod api;
pub mod identity;
pub mod nickname;
pub mod commands;
pub mod app;

pub use config::{ClientConfig, ConfigError};
pub use network::{EventReceiver, WsConnector, WsTransport};
pub use api::{ApiClient, ApiError};
pub use app::{App, Flow};
