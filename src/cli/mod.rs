//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::LogLevel;

/// Tag-driven test suite worker
#[derive(Parser, Debug)]
#[command(name = "test-runner-worker")]
#[command(version = "0.1.0")]
#[command(about = "Run tagged test suites from a job queue and report the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", value_parser = parse_log_level)]
    pub log_level: LogLevel,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Effective log level; `--verbose` forces debug
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(s).ok_or_else(|| format!("unknown log level '{s}'"))
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Consume jobs from a spool directory
    Worker(WorkerArgs),

    /// Run one job in-process and print the result
    Run(RunArgs),

    /// Publish a job into a spool directory
    Enqueue(EnqueueArgs),

    /// List registered tests
    List(ListArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Arguments for worker command
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Spool directory to consume
    #[arg(short, long, default_value = "spool")]
    pub spool: PathBuf,

    /// Exit once the spool is empty instead of polling
    #[arg(long)]
    pub once: bool,

    /// Read newline-delimited job messages from stdin instead of a spool
    #[arg(long, conflicts_with = "spool")]
    pub stdin: bool,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Comma-separated tags; a test runs when it has all of them
    #[arg(short, long)]
    pub tags: String,

    /// Target environment name
    #[arg(short, long, default_value = "")]
    pub env: String,

    /// Run id (generated when omitted)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Also deliver the result to the management API
    #[arg(long)]
    pub report: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for enqueue command
#[derive(Parser, Debug)]
pub struct EnqueueArgs {
    /// Comma-separated tags
    #[arg(short, long)]
    pub tags: String,

    /// Target environment name
    #[arg(short, long, default_value = "")]
    pub env: String,

    /// Run id (generated when omitted)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Spool directory to write to
    #[arg(short, long, default_value = "spool")]
    pub spool: PathBuf,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only show tests selected by these tags
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Show descriptions and non-matching tests
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "test-runner.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the discovered file)
        path: Option<PathBuf>,
    },

    /// Show environment variable overrides
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["test-runner-worker", "list", "--detailed"]);
        match args.command {
            Command::List(list_args) => {
                assert!(list_args.detailed);
                assert!(list_args.tags.is_none());
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "test-runner-worker",
            "run",
            "--tags",
            "smoke,api",
            "--env",
            "staging",
            "--format",
            "json",
            "-v",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::Run(run_args) => {
                assert_eq!(run_args.tags, "smoke,api");
                assert_eq!(run_args.env, "staging");
                assert_eq!(run_args.format, "json");
                assert!(!run_args.report);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_worker_args() {
        let args = Args::parse_from([
            "test-runner-worker",
            "--config",
            "custom.yaml",
            "worker",
            "--spool",
            "/var/spool/tests",
            "--once",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("custom.yaml")));
        match args.command {
            Command::Worker(worker_args) => {
                assert_eq!(worker_args.spool, PathBuf::from("/var/spool/tests"));
                assert!(worker_args.once);
            }
            _ => panic!("Expected Worker command"),
        }
    }

    #[test]
    fn test_worker_stdin_conflicts_with_spool() {
        let args = Args::parse_from(["test-runner-worker", "worker", "--stdin"]);
        match args.command {
            Command::Worker(worker_args) => assert!(worker_args.stdin),
            _ => panic!("Expected Worker command"),
        }

        let err = Args::try_parse_from([
            "test-runner-worker",
            "worker",
            "--stdin",
            "--spool",
            "x",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_config_init_default_path() {
        let args = Args::parse_from(["test-runner-worker", "config", "init"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, PathBuf::from("test-runner.yaml"));
                assert!(!force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_log_level_and_color_flags() {
        let args = Args::parse_from(["test-runner-worker", "list"]);
        assert_eq!(args.effective_log_level(), LogLevel::Info);
        assert!(!args.no_color);

        let args = Args::parse_from([
            "test-runner-worker",
            "list",
            "--log-level",
            "WARN",
            "--no-color",
        ]);
        assert_eq!(args.effective_log_level(), LogLevel::Warn);
        assert!(args.no_color);

        let args = Args::parse_from(["test-runner-worker", "--log-level", "error", "-v", "list"]);
        assert_eq!(args.effective_log_level(), LogLevel::Debug);

        let err = Args::try_parse_from(["test-runner-worker", "--log-level", "loud", "list"]);
        assert!(err.is_err());
    }
}
