//! Session management for the connected bridge
//!
//! This module handles:
//! - Accepting WebSocket connections from the bridge
//! - Keeping exactly one active session (newest wins)
//! - Routing commands out and responses/events back in

mod connection;
mod manager;

pub use connection::{BridgeSession, SessionHandle};
pub use manager::SessionManager;

#[cfg(test)]
pub(crate) use connection::testing;
