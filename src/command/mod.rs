//! Command execution for the bridge
//!
//! This module handles:
//! - Dispatching decoded tasks to the matching handler
//! - Turning handler results into response envelopes
//! - The fixed-period dispatch loop that drives the document host

mod dispatcher;
mod executor;
pub mod handlers;

pub use dispatcher::{DispatchConfig, DispatchLoop};
pub use executor::{execute, CommandResult};
