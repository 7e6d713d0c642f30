//! Secret provider implementations.
//!
//! - `env`: Environment variable provider

pub mod env;
