//! stomp-protocol
//!
//! STOMP 1.2 text frames for the game session client.
//!
//! This crate turns logical session messages
//! (`session_core::OutboundMessage` / `InboundFrame`) into frames and
//! back again, and knows nothing about sockets.
//!
//! - [`wire_types`]  : command table, header names, heart-beats
//! - [`frame_codec`] : frame text encoding and streaming decode
//! - [`frames`]      : builders for client frames, MESSAGE / ERROR mapping

pub mod wire_types;
pub mod frame_codec;
pub mod frames;

pub use wire_types::{Command, HeartBeat, Negotiated, ACCEPT_VERSION};

pub use frame_codec::{
    ProtocolError,
    Decoded,
    Frame,
    decode_all,
    decode_leading,
    decode_next,
    encode_frame,
};

pub use frames::{
    broker_error,
    connect_frame,
    disconnect_frame,
    inbound_from_frame,
    send_frame,
    subscribe_frame,
    unsubscribe_frame,
};
