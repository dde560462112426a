//! Signaling relay for peer-to-peer media sessions.
//!
//! Relays connection offers, answers and network-path candidates between
//! named endpoints so they can establish a direct media channel. The
//! relay transports no media and keeps no state beyond a live
//! identity → connection registry.

pub mod client;
pub mod framing;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use client::SignalingClient;
pub use framing::{read_frame, read_message, write_message};
pub use protocol::SignalMessage;
pub use registry::{ClientHandle, Registry};
pub use server::RelayServer;
