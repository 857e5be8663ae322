use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use folio::cli::Cli;
use folio::dispatcher::dispatch_command;

fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays clean; RUST_LOG overrides the level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    dispatch_command(cli.command, cli.json, cli.config.as_deref())
}
