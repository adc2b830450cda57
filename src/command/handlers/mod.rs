//! Command handlers for the supported actions

mod replace;
mod save;

pub use replace::handle_replace;
pub use save::handle_save;
