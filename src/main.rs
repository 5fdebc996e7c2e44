use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use dotfiles_modules::cli::{self, Command};
use dotfiles_modules::commands;
use dotfiles_modules::logging::{self, Log, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    let (name, stdout_reserved) = match &args.command {
        Command::Build(opts) => ("build", commands::build::writes_stdout(opts)),
        Command::Config => ("config", true),
        Command::Schema => ("schema", true),
        Command::Version => {
            commands::version::run();
            return ExitCode::SUCCESS;
        }
    };
    logging::init_subscriber(args.verbose, stdout_reserved, name);
    let logger = Arc::new(Logger::new(name));
    let log: Arc<dyn Log> = logger.clone();

    let result = match &args.command {
        Command::Build(opts) => commands::build::run(&args.global, opts, &log),
        Command::Config => commands::config::run(&args.global, log.as_ref()),
        Command::Schema => commands::schema::run(),
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            if let Some(path) = logger.log_path() {
                log.info(&format!("log: {}", path.display()));
            }
            ExitCode::FAILURE
        }
    }
}
