//! Connection management for the controller channel
//!
//! This module handles:
//! - The WebSocket transport client and its state machine
//! - The supervised receive loop with fixed-delay reconnection
//! - Decoding inbound commands onto the task queue

mod client;
mod manager;
pub(crate) mod sink;

pub use client::{TransportClient, TransportConfig};
pub use manager::receive_loop;
pub use sink::MessageSink;
