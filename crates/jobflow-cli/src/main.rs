//! jobflow CLI entry point.
//!
//! Binary name: `jobflow`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the command handler.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use clap_complete::generate;

use cli::run::{OutputMode, RunArgs};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Shell completions need neither tracing nor configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "jobflow", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let filter = jobflow_observe::tracing_setup::verbosity_filter(cli.verbose, cli.quiet);
    jobflow_observe::tracing_setup::init_tracing(filter, cli.json, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let config = jobflow_infra::config::load_resolved_config(cli.config.as_deref()).await;

    let result = dispatch(cli, &config).await;
    jobflow_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli, config: &jobflow_types::config::GlobalConfig) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            file,
            params,
            context,
            working_dir,
        } => {
            let succeeded = cli::run::handle_run(
                RunArgs {
                    file: &file,
                    params: &params,
                    context: &context,
                    working_dir,
                },
                config,
                OutputMode {
                    json: cli.json,
                    quiet: cli.quiet,
                    verbose: cli.verbose > 0,
                },
            )
            .await?;
            Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Render { file, format } => {
            cli::inspect::handle_render(&file, format, config, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Plan { file } => {
            cli::inspect::handle_plan(&file, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { file } => {
            cli::inspect::handle_validate(&file, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}
