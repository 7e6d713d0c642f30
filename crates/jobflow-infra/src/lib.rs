//! Infrastructure layer for jobflow.
//!
//! Contains implementations of the collaborator traits defined in
//! `jobflow-core`: a tokio subprocess runner and environment-backed secret
//! lookup, plus the global configuration loader.

pub mod config;
pub mod process;
pub mod secret;
