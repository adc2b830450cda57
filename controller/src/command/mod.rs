//! Command dispatch and timeout tracking for the controller
//!
//! This module handles:
//! - Assigning ids and sending commands to the bridge
//! - Tracking pending commands until their response arrives
//! - Reporting commands whose response never came

mod dispatcher;
mod timeout;

pub use dispatcher::{CommandDispatcher, PendingCommand};
pub use timeout::TimeoutTracker;
