use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::settings::OutputFormat;

/// Top-level CLI entry point for the task orchestration engine.
#[derive(Parser, Debug)]
#[command(
    name = "taskscript",
    about = "Declarative, idempotent task orchestration",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Settings file (default: taskscript.toml next to the script document)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a script document
    Run(RunOpts),
    /// Build and order a script document without executing it
    Validate(ValidateOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Validate(_) => "validate",
            Self::Version => "version",
        }
    }
}

/// Options for the `run` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RunOpts {
    /// Script document (YAML)
    pub file: PathBuf,

    /// Stop after the current script once any task failed
    #[arg(long)]
    pub abort_on_error: bool,

    /// Summary format (overrides the settings file)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

/// Options for the `validate` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ValidateOpts {
    /// Script document (YAML)
    pub file: PathBuf,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_with_file() {
        let cli = Cli::parse_from(["taskscript", "run", "site.yaml"]);
        assert!(
            matches!(&cli.command, Command::Run(opts) if opts.file == PathBuf::from("site.yaml")),
            "{:?}",
            cli.command
        );
        assert_eq!(cli.command.name(), "run");
    }

    #[test]
    fn parse_run_flags() {
        let cli = Cli::parse_from([
            "taskscript",
            "run",
            "site.yaml",
            "--abort-on-error",
            "--output",
            "json",
        ]);
        assert!(
            matches!(
                &cli.command,
                Command::Run(opts) if opts.abort_on_error && opts.output == Some(OutputFormat::Json)
            ),
            "{:?}",
            cli.command
        );
    }

    #[test]
    fn output_defaults_to_settings() {
        let cli = Cli::parse_from(["taskscript", "run", "site.yaml"]);
        assert!(matches!(&cli.command, Command::Run(opts) if opts.output.is_none()));
    }

    #[test]
    fn parse_settings_is_global() {
        let cli = Cli::parse_from(["taskscript", "validate", "site.yaml", "--settings", "/etc/ts.toml"]);
        assert_eq!(cli.global.settings, Some(PathBuf::from("/etc/ts.toml")));
        assert!(matches!(cli.command, Command::Validate(_)));
    }

    #[test]
    fn run_requires_file() {
        assert!(Cli::try_parse_from(["taskscript", "run"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["taskscript", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["taskscript", "-v", "validate", "site.yaml"]);
        assert!(cli.verbose);
    }
}
