//! Command-line argument parsing.
//!
//! Usage:
//!   pad [-d] [-v...] [--stdlib <dir>] [<file> [<args>...]]
//!
//! Without `<file>` the program is read from stdin.  `<file>` and
//! `<args>` become the program's own argument vector, visible to scripts
//! through the `opts` module.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "pad", version, about = "Run a Pad template program")]
pub struct CliArgs {
    /// Debug mode: verbose logging and function names in error traces.
    #[arg(short, long)]
    pub debug: bool,

    /// Raise log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Standard library directory override.
    #[arg(long, value_name = "DIR")]
    pub stdlib: Option<PathBuf>,

    /// Program file; stdin when omitted.
    pub file: Option<PathBuf>,

    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl CliArgs {
    /// Default `tracing` directive when `PAD_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match (self.debug, self.verbose) {
            (_, v) if v >= 2 => "pad=trace",
            (true, _) | (_, 1) => "pad=debug",
            _ => "pad=warn",
        }
    }

    /// The argument vector seen by the program: file name first.
    pub fn program_argv(&self) -> Vec<String> {
        let name = match &self.file {
            Some(path) => path.display().to_string(),
            None => "-".to_owned(),
        };
        std::iter::once(name).chain(self.args.iter().cloned()).collect()
    }
}

/// Parse `std::env::args()`, exiting with usage on error.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Parse an explicit argument list, program name first (exposed for testing).
pub fn parse_argv<I, T>(argv: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CliArgs::try_parse_from(argv)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
