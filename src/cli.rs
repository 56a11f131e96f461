//! CLI interface for kiln.
//!
//! - `kiln build`: build the compiler, then print what it makes of the program.
//! - `kiln assemble`: build the compiler, compile the program, assemble and link.
//! - `kiln test`: build the compiler, then run every golden-transcript fixture.
//! - `kiln clean`: forget the memoized build state.

mod format;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::build::{self, BuildContext};
use crate::config::Config;
use crate::harness::Harness;
use crate::storage::Storage;

use format::{format_result, format_summary};

/// kiln: build the toolchain, check the compiler against golden transcripts.
#[derive(Debug, Parser)]
#[command(name = "kiln", version)]
pub struct Cli {
    /// Config file (defaults to `kiln.toml` when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more: `-v` for progress, `-vv` for every command line.
    /// Ignored when `KILN_LOG` is set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the compiler and run the program through it.
    ///
    /// The compiler is only rebuilt when its sources or build command changed.
    /// The compiler's output for the program is printed to stdout.
    Build,

    /// Build the compiler, compile the program, assemble and link it.
    ///
    /// Prints the path of the linked executable.
    Assemble,

    /// Build the compiler and run the golden-transcript tests.
    ///
    /// Failures are reported but don't change the exit status unless
    /// `--strict` is given.
    Test {
        /// Exit with status 1 when any test failed or is malformed.
        #[arg(long)]
        strict: bool,

        /// Report format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Remove the memoized build state so the next build starts fresh.
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// Runs the parsed command.
pub fn run(cli: Cli) -> Result<ExitCode, String> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Build => cmd_build(&config),
        Command::Assemble => cmd_assemble(&config),
        Command::Test { strict, format } => cmd_test(&config, strict, format),
        Command::Clean => cmd_clean(&config),
    }
}

fn open_storage(config: &Config) -> Result<Storage, String> {
    let storage = Storage::open(&config.buildroot)
        .map_err(|e| format!("failed to open build state: {e}"))?;
    debug!(path = %storage.path().display(), "opened build state");
    Ok(storage)
}

fn cmd_build(config: &Config) -> Result<ExitCode, String> {
    let storage = open_storage(config)?;
    let mut ctx = BuildContext::new();
    build::build_compiler(config, &storage, &mut ctx).map_err(|e| e.to_string())?;
    let asm = build::emit_program(config, &mut ctx).map_err(|e| e.to_string())?;

    let output = fs::read(&asm).map_err(|e| format!("failed to read {}: {e}", asm.display()))?;
    io::stdout()
        .write_all(&output)
        .map_err(|e| format!("failed to write output: {e}"))?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_assemble(config: &Config) -> Result<ExitCode, String> {
    let storage = open_storage(config)?;
    let ctx = build::build_all(config, &storage).map_err(|e| e.to_string())?;
    let executable = ctx.get(build::EXECUTABLE).map_err(|e| e.to_string())?;
    println!("{}", executable.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_test(config: &Config, strict: bool, format: Format) -> Result<ExitCode, String> {
    let storage = open_storage(config)?;
    let compiler = build::build_compiler(config, &storage, &mut BuildContext::new())
        .map_err(|e| e.to_string())?;

    let results = Harness::from_config(&config.tests)
        .run_all(&compiler)
        .map_err(|e| e.to_string())?;

    match format {
        Format::Text => {
            for result in &results {
                print!("{}", format_result(result));
            }
            println!("{}", format_summary(&results));
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(&results)
                .map_err(|e| format!("failed to serialize results: {e}"))?;
            println!("{json}");
        }
    }

    if strict && results.iter().any(|r| !r.passed()) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_clean(config: &Config) -> Result<ExitCode, String> {
    let removed = Storage::remove(&config.buildroot)
        .map_err(|e| format!("failed to remove build state: {e}"))?;
    if removed {
        eprintln!("Removed build state from {}", config.buildroot.display());
    } else {
        eprintln!("No build state in {}", config.buildroot.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_text_and_lenient() {
        let cli = Cli::try_parse_from(["kiln", "test"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Test {
                strict: false,
                format: Format::Text
            }
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["kiln", "test", "--strict", "-vv", "--config", "k.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("k.toml")));
        assert!(matches!(cli.command, Command::Test { strict: true, .. }));
    }

    #[test]
    fn json_format_parses() {
        let cli = Cli::try_parse_from(["kiln", "test", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Test {
                format: Format::Json,
                ..
            }
        ));
    }
}
