use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use userapps_cli::{cli, commands, config, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Manage(opts) => {
            let log_file = config::paths::log_path("manage");
            logging::init_subscriber(args.verbose, "manage", log_file.as_deref());
            let log = Arc::new(logging::Logger::new(log_file));
            commands::manage::run(&args.global, &opts, &log)
        }
        cli::Command::Ids => commands::ids::run(&args.global),
        cli::Command::Completions { shell } => {
            commands::completions::run(shell);
            Ok(())
        }
        cli::Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
