//! Shared domain types for jobflow.
//!
//! This crate contains the data model used across the workspace: literals,
//! task contracts, jobs and the references that wire them together, the
//! condition expression tree, run records, the external document, executor
//! events, configuration, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod contract;
pub mod document;
pub mod error;
pub mod event;
pub mod expression;
pub mod job;
pub mod literal;
pub mod run;
