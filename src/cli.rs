//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Campus location directory compiler
#[derive(Parser, Debug)]
#[command(name = "campus-atlas")]
#[command(about = "Compiles a consistent campus location directory out of inconsistent sources")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands for campus-atlas
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and write the compiled entity graph
    #[command(visible_alias = "c")]
    Compile(CompileArgs),

    /// Run the pipeline, print statistics and warnings, write nothing
    #[command(visible_alias = "v")]
    Validate(ValidateArgs),
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Data directory with areatree, source snapshots and catalogs
    #[arg(env = "ATLAS_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Output file for the compiled entity graph
    #[arg(short, long, default_value = "graph.json")]
    pub out: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Data directory with areatree, source snapshots and catalogs
    #[arg(env = "ATLAS_DATA_DIR")]
    pub data_dir: PathBuf,
}
