// src/main.rs

mod cli;
mod commands;

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;
use txplan::{Config, Context, ContextOptions, Failure, Interrupted, abort_on_panic};

/// Exit status of a run stopped by SIGINT
const EXIT_INTERRUPTED: u8 = 130;

fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Interrupted>().is_some()
        || err.downcast_ref::<Failure>().is_some_and(Failure::is_cancellation)
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    let ctx = Context::new(config, ContextOptions::default())?;

    let result = match cli.command {
        Some(Commands::Plan {
            channels,
            prefix,
            install,
            remove,
            json,
        }) => commands::cmd_plan(
            &ctx,
            commands::PlanArgs {
                channels,
                prefix,
                install,
                remove,
                json,
            },
        ),
        Some(Commands::ShowConfig) => commands::cmd_show_config(&ctx),
        None => {
            println!("txplan v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'txplan --help' for usage information");
            Ok(())
        }
    };

    ctx.shutdown()?;
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match abort_on_panic(|| run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_cancellation(&err) => {
            eprintln!("{}", Interrupted);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
