//! reversion - rewrite the version of a built wheel

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use reversion_cli::{Cli, exit_status, run};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(done) => {
            writeln!(std::io::stdout().lock(), "{}", done.path.display())
                .context("failed to print output path")?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("{err}");
            Ok(ExitCode::from(exit_status(err.exit_code())))
        }
    }
}
