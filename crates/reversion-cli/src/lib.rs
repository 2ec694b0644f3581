//! reversion - rewrite the version of a built wheel
//!
//! The binary is a thin shell over [`reversion_core::reversion`]: it parses
//! flags into [`PipelineOptions`], installs logging and maps failures onto
//! per-kind exit codes.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use reversion_core::{PipelineOptions, ReversionError, Reversioned};
use tracing_subscriber::EnvFilter;

/// Comma-separated rewrite globs used when no `--extra-glob` is given.
pub const EXTRA_GLOBS_ENV: &str = "REVERSION_EXTRA_GLOBS";

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "reversion")]
#[command(author, version, about = "Rewrite the version of a built wheel")]
pub struct Cli {
    /// Wheel to reversion
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Version to write in place of the declared one
    #[arg(long, short = 't')]
    pub target_version: String,

    /// Directory that receives the output wheel
    #[arg(long, short = 'd', env = "REVERSION_DEST_DIR")]
    pub dest_dir: PathBuf,

    /// Additional entry to rewrite, one glob per flag (repeatable; defaults
    /// to the comma-separated REVERSION_EXTRA_GLOBS)
    #[arg(long = "extra-glob", value_name = "PATTERN", action = ArgAction::Append)]
    pub extra_globs: Vec<String>,

    /// Deflate level for the output (0-9)
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..=9))]
    pub compression_level: Option<i64>,

    /// Log every stage and rewritten entry
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Pipeline settings for these arguments, falling back to
    /// [`EXTRA_GLOBS_ENV`] when no `--extra-glob` was given.
    pub fn options(&self) -> PipelineOptions {
        self.options_with_env(std::env::var(EXTRA_GLOBS_ENV).ok().as_deref())
    }

    fn options_with_env(&self, env_globs: Option<&str>) -> PipelineOptions {
        let extra_globs: Vec<String> = if self.extra_globs.is_empty() {
            env_globs
                .into_iter()
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|glob| !glob.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            self.extra_globs.clone()
        };

        let mut options = PipelineOptions::new(&self.target_version, &self.dest_dir)
            .with_extra_globs(extra_globs);
        options.compression_level = self.compression_level;
        options
    }

    /// Log filter: `--verbose`/`--quiet` win, then `RUST_LOG`, then `info`.
    pub fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            return EnvFilter::new("debug");
        }
        if self.quiet {
            return EnvFilter::new("warn");
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Run the pipeline for `cli`.
///
/// # Errors
///
/// Returns the pipeline's [`ReversionError`] unchanged.
pub fn run(cli: &Cli) -> Result<Reversioned, ReversionError> {
    reversion_core::reversion(&cli.input, &cli.options())
}

/// Clamp a per-kind exit code into the range a process can report.
pub fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
