//! Event bus for run progress.
//!
//! Provides an `EventBus` that distributes `ExecutorEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::{EventBus, drain};
