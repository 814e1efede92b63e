//! Binary entry point for the dpcheck CLI.
//!
//! ## Usage
//!
//! ```bash
//! # List the rules
//! dpcheck rules
//!
//! # Analyze a serialized snapshot, or C# files directly
//! dpcheck analyze --snapshot snapshot.json --options dpcheck.json
//! dpcheck analyze --source src/FooControl.cs src/BarControl.cs
//!
//! # Preview the fix for a diagnostic, or write it back to the sources
//! dpcheck fix --source src/FooControl.cs --id WPF0001 --at src/FooControl.cs:12:47
//! dpcheck fix --source src/FooControl.cs --id WPF0001 --at src/FooControl.cs:12:47 --write
//! ```
//!
//! All output on stdout is JSON; logs go to stderr, as text or as JSON
//! lines with `--log-format json`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use dpcheck::cli::{load_options, run_analyze, run_fix, run_rules, FixMode, Input};
use dpcheck::error::{DpcheckError, OutputErrorCode};
use dpcheck::output::{emit_response, ErrorResponse};
use dpcheck::CancellationToken;

// ============================================================================
// CLI Structure
// ============================================================================

/// Dependency-property convention checks and fixes for WPF code.
#[derive(Parser, Debug)]
#[command(name = "dpcheck", version, about = "Dependency-property checks and fixes for WPF code")]
struct Cli {
    /// Log level for tracing output (RUST_LOG takes precedence).
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Format of the log lines written to stderr.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Snapshot source and analyzer options, shared by `analyze` and `fix`.
#[derive(Args, Debug)]
struct InputArgs {
    /// Serialized symbol table (JSON).
    #[arg(long, conflicts_with = "source", required_unless_present = "source")]
    snapshot: Option<PathBuf>,

    /// C# source files to parse.
    #[arg(long, num_args = 1..)]
    source: Vec<PathBuf>,

    /// Analyzer options file (JSON).
    #[arg(long)]
    options: Option<PathBuf>,
}

impl InputArgs {
    fn input(&self) -> Input {
        match &self.snapshot {
            Some(path) => Input::Snapshot(path.clone()),
            None => Input::Sources(self.source.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rule table.
    Rules,
    /// Report diagnostics for a snapshot.
    Analyze {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the fix for one diagnostic.
    Fix {
        #[command(flatten)]
        input: InputArgs,
        /// Rule id of the diagnostic, e.g. WPF0001.
        #[arg(long)]
        id: String,
        /// Position inside the diagnostic (path:line:col).
        #[arg(long)]
        at: String,
        /// Write the edited files back (source input only).
        #[arg(long)]
        write: bool,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_format);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let _ = emit_response(&ErrorResponse::from_error(&err), &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn execute(cli: Cli) -> Result<(), DpcheckError> {
    let cancel = CancellationToken::new();
    match cli.command {
        Command::Rules => emit(&run_rules()),
        Command::Analyze { input } => {
            info!(command = "analyze", "starting");
            let table = input.input().load()?;
            let options = load_options(input.options.as_deref())?;
            emit(&run_analyze(&table, options, &cancel)?)
        }
        Command::Fix {
            input,
            id,
            at,
            write,
        } => {
            info!(command = "fix", rule_id = %id, %at, "starting");
            let source = input.input();
            if write && matches!(source, Input::Snapshot(_)) {
                return Err(DpcheckError::invalid_args("--write requires --source input"));
            }
            let table = source.load()?;
            let options = load_options(input.options.as_deref())?;
            let mode = if write { FixMode::Write } else { FixMode::Preview };
            emit(&run_fix(&table, options, &id, &at, mode, &cancel)?)
        }
    }
}

fn emit<T: serde::Serialize>(response: &T) -> Result<(), DpcheckError> {
    emit_response(response, &mut io::stdout()).map_err(|e| DpcheckError::internal(e.to_string()))?;
    let _ = io::stdout().flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn log_format_defaults_to_text() {
            let cli = Cli::try_parse_from(["dpcheck", "rules"]).unwrap();
            assert_eq!(cli.log_format, LogFormat::Text);
        }

        #[test]
        fn log_format_json_is_global() {
            let args = ["dpcheck", "analyze", "--source", "Foo.cs", "--log-format", "json"];
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.log_format, LogFormat::Json);
            assert!(matches!(cli.command, Command::Analyze { .. }));
        }

        #[test]
        fn write_with_fix_arguments() {
            let args = [
                "dpcheck", "fix", "--source", "Foo.cs", "--id", "WPF0001", "--at", "Foo.cs:4:47", "--write",
            ];
            let cli = Cli::try_parse_from(args).unwrap();
            assert!(matches!(cli.command, Command::Fix { write: true, .. }));
        }
    }
}
