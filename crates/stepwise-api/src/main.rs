//! stepwise CLI and REST API entry point.
//!
//! Binary name: `stepwise`
//!
//! Parses CLI arguments, loads the engine configuration, wires connectors,
//! then runs a workflow file or starts the REST API server.

mod cli;
mod http;
mod state;

use std::process::ExitCode;

use clap::Parser;
use stepwise_types::workflow::RunStatus;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    stepwise_observe::tracing_setup::init_tracing(cli::log_directives(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    stepwise_observe::tracing_setup::shutdown_tracing();
    result
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Run {
            file,
            stream,
            credentials,
            continue_on_error,
        } => {
            let args = cli::run::RunArgs {
                file: &file,
                stream,
                credentials: credentials.as_deref(),
                continue_on_error,
            };
            let status = cli::run::handle_run(&state, args, cli.json, cli.quiet).await?;
            Ok(if status == RunStatus::Completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Validate { file } => {
            let valid = cli::run::handle_validate(&state, &file, cli.json)?;
            Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            tracing::info!(
                addr = %addr,
                halt_on_error = state.executor.config().halt_on_error,
                dl_service_url = %state.executor.config().connectors.dl_service_url,
                "HTTP API starting"
            );
            if !cli.quiet {
                println!(
                    "  {} stepwise API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
