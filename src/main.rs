use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use taskscript_cli::cli::{Cli, Command};
use taskscript_cli::commands;
use taskscript_cli::logging::{self, Log, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let logger = Logger::new(name);
    if let Some(path) = logger.log_path() {
        logger.debug(&format!("logging to {}", path.display()));
    }
    let log: Arc<dyn Log> = Arc::new(logger);

    match args.command {
        Command::Run(opts) => commands::run::run(&args.global, &opts, &log),
        Command::Validate(opts) => commands::validate::run(&args.global, &opts, log.as_ref()),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
