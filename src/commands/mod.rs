//! Command handlers
//!
//! The operations exposed by the command line: capture-and-plan, offline
//! re-planning of a saved capture, and replay of a saved bundle.

pub mod record;
pub mod replay;

pub use record::{plan_capture, record, replan, wait_for_stop, RecordOutcome};
pub use replay::replay;
