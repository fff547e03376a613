//! campus-atlas CLI entry point

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use campus_atlas::cli::{Cli, Commands};
use campus_atlas::{commands, AtlasError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match run(&cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            e.downcast_ref::<AtlasError>()
                .map(AtlasError::exit_code)
                .unwrap_or(ExitCode::FAILURE)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    match &cli.command {
        Commands::Compile(args) => commands::compile::run(args)
            .with_context(|| format!("compiling data directory {}", args.data_dir.display())),
        Commands::Validate(args) => commands::validate::run(args)
            .with_context(|| format!("validating data directory {}", args.data_dir.display())),
    }
}
