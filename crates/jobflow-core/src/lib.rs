//! Business logic and collaborator trait definitions for jobflow.
//!
//! This crate builds job graphs from task contracts, evaluates and renders
//! condition expressions, turns graphs into external workflow documents and
//! executes them locally in dependency waves. Process spawning and secret
//! lookup are reached through the `CommandRunner` and `SecretProvider`
//! traits; concrete implementations live in `jobflow-infra`.

pub mod command;
pub mod definition;
pub mod event;
pub mod executor;
pub mod expression;
pub mod generator;
pub mod graph;
pub mod registry;
pub mod runner;
pub mod secret;
