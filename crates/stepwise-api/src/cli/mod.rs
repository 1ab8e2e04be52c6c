//! CLI command definitions for the `stepwise` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run and serve graph-based automation workflows.
#[derive(Parser)]
#[command(name = "stepwise", version, about, long_about = None)]
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

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Engine configuration file (TOML).
    #[arg(long, global = true, env = "STEPWISE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow definition (JSON or YAML).
    Run {
        /// Path to the workflow file.
        file: PathBuf,

        /// Print progress events as NDJSON while the run progresses.
        #[arg(long)]
        stream: bool,

        /// JSON file with the credential blob passed to connectors.
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Keep running independent branches after a step error.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Validate a workflow definition and print its execution order.
    Validate {
        /// Path to the workflow file.
        file: PathBuf,
    },

    /// Start the HTTP API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Host address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

/// Default tracing directives for the verbosity flags.
pub fn log_directives(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,stepwise=debug",
        _ => "trace",
    }
}
