//! CLI command definitions and dispatch for the `jobflow` binary.
//!
//! Uses clap derive macros for argument parsing. Every command takes an
//! automation definition file; `run` executes it locally, the others
//! inspect it.

pub mod bindings;
pub mod inspect;
pub mod progress;
pub mod run;
pub mod summary;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Define job graphs once; run them locally or emit them for CI.
#[derive(Parser)]
#[command(name = "jobflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ./jobflow.toml, then ~/.jobflow/config.toml).
    #[arg(long, global = true, env = "JOBFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an automation on this machine.
    Run {
        /// Path to the automation YAML file.
        file: PathBuf,

        /// Bind an automation parameter (repeatable).
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Bind a context value such as `github.ref_name` (repeatable).
        #[arg(long = "context", short = 'c', value_name = "PATH=VALUE")]
        context: Vec<String>,

        /// Directory jobs run in (overrides the configuration).
        #[arg(long)]
        working_dir: Option<PathBuf>,
    },

    /// Print the external workflow document for an automation.
    Render {
        /// Path to the automation YAML file.
        file: PathBuf,

        /// Document serialization.
        #[arg(long, value_enum, default_value = "yaml")]
        format: DocumentFormat,
    },

    /// Show the waves a local run would go through.
    Plan {
        /// Path to the automation YAML file.
        file: PathBuf,
    },

    /// Build an automation in both modes and report what was declared.
    Validate {
        /// Path to the automation YAML file.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Yaml,
    Json,
}
