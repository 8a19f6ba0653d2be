//! `rfetch` - command-line HTTP client.

use std::{io::Write, process::ExitCode};

use clap::{error::ErrorKind, Parser};
use rfetch::{
    cli::{self, Cli, Exit},
    ReqwestTransport,
};
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let invocation = match Cli::try_parse_from(cli::normalize_args(std::env::args_os())) {
        Ok(invocation) => invocation,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Exit::Success.into(),
                _ => Exit::Failure.into(),
            };
        }
    };

    init_tracing(invocation.verbose());

    let transport = match ReqwestTransport::new() {
        Ok(transport) => transport,
        Err(err) => {
            println!("Error: {err}");
            return Exit::Failure.into();
        }
    };

    let mut stdout = std::io::stdout();
    let exit = cli::run_until(invocation, transport, &mut stdout, shutdown_signal()).await;
    let _ = stdout.flush();
    exit.into()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
