//! Save watcher
//!
//! Samples the document host once per dispatch cycle and reports
//! unsaved -> saved transitions as `saved` events.

mod poller;

pub use poller::SavePoller;
