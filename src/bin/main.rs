//! Tally CLI - check ledgers and query their state
//!
//! Usage:
//!   tally check <file.bean>
//!   tally errors <file.bean> [--format json]
//!   tally balances <file.bean>
//!
//! A sibling `<file>.config` naming the real root is honored. Exit status
//! is zero exactly when no error-severity diagnostic exists.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tally::project::{LoadError, Project, ProjectConfig};
use tally::report::Severity;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally - a fast plain-text double-entry accounting engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a ledger and print every diagnostic with a source excerpt
    Check {
        /// Path to the root ledger (or a .config pointing at it)
        file: PathBuf,

        /// Disable ANSI colour in the output
        #[arg(long)]
        no_color: bool,
    },

    /// List diagnostics, machine-readably if requested
    Errors {
        /// Path to the root ledger (or a .config pointing at it)
        file: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the account tree with aggregated balances
    Balances {
        /// Path to the root ledger (or a .config pointing at it)
        file: PathBuf,
    },

    /// Print an account's journal with running totals
    Journal {
        /// Path to the root ledger (or a .config pointing at it)
        file: PathBuf,

        /// The account (subtree) to list
        account: String,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Check { file, no_color } => cmd_check(file, no_color),
        Commands::Errors { file, format } => cmd_errors(file, format),
        Commands::Balances { file } => cmd_balances(file),
        Commands::Journal { file, account } => cmd_journal(file, account),
    }
}

/// Resolve a path through an optional sidecar config, then load.
fn load_project(file: &Path) -> Result<Project, LoadError> {
    let root = if file.extension().is_some_and(|ext| ext == "config") {
        ProjectConfig::load(file)?.root
    } else {
        match ProjectConfig::discover(file)? {
            Some(config) => config.root,
            None => file.to_path_buf(),
        }
    };
    Project::load(root)
}

fn cmd_check(file: PathBuf, no_color: bool) -> ExitCode {
    let project = match load_project(&file) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("Error loading '{}': {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    for details in project.collect_errors().values().flatten() {
        eprint!("{}", details.render(&cwd, !no_color));
    }
    if project.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_errors(file: PathBuf, format: OutputFormat) -> ExitCode {
    let project = match load_project(&file) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("Error loading '{}': {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match format {
        OutputFormat::Text => {
            for details in project.collect_errors().values().flatten() {
                let (line, column) = details.position();
                println!(
                    "{}:{}:{}: {}",
                    details.uri.relative(&cwd),
                    line + 1,
                    column + 1,
                    details.message()
                );
            }
        }
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = project
                .collect_errors()
                .values()
                .flatten()
                .map(|details| {
                    let (line, column) = details.position();
                    serde_json::json!({
                        "file": details.uri.relative(&cwd),
                        "line": line,
                        "column": column,
                        "severity": match details.severity() {
                            Severity::Error => "error",
                            Severity::Warning => "warning",
                        },
                        "message": details.message(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
            );
        }
    }
    if project.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_balances(file: PathBuf) -> ExitCode {
    let project = match load_project(&file) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("Error loading '{}': {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };
    print!("{}", project.tree().print());
    if project.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_journal(file: PathBuf, account: String) -> ExitCode {
    let project = match load_project(&file) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("Error loading '{}': {}", file.display(), err);
            return ExitCode::FAILURE;
        }
    };
    for line in project.journal(&account) {
        let deltas: Vec<String> = line
            .deltas
            .iter()
            .map(|(currency, delta)| format!("{} {}", delta, currency))
            .collect();
        let running: Vec<String> = line
            .running
            .iter()
            .map(|(currency, total)| format!("{} {}", total, currency))
            .collect();
        println!(
            "{}  {:<40}  {:>20}  {:>20}",
            line.date,
            line.description,
            deltas.join(", "),
            running.join(", ")
        );
    }
    if project.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
