use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod args;
mod commands;

use args::Cli;
use commands::run_command;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so table output stays pipeable, and so the capture
    // worker's output lands in the log file the controller redirects
    // stderr into.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
