//! Application startup
//!
//! Parses arguments, resolves configuration, starts logging and dispatches
//! the subcommand. Returns the process exit status.

use super::cli::args::{Args, Command};
use super::cli::config::resolve_settings;
use super::commands::{run_list, run_scan, EXIT_FAILURE};
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::styles::palette_to_clap;
use crate::core::version;
use crate::scanner::api::ScanCoordinator;
use clap::{CommandFactory, FromArgMatches};
use std::io::IsTerminal;
use std::sync::Arc;

/// Parse the process arguments and run
pub async fn startup() -> i32 {
    let matches = Args::command()
        .styles(palette_to_clap(std::io::stdout().is_terminal()))
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    run(args).await
}

pub async fn run(args: Args) -> i32 {
    let mut settings = match resolve_settings(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };

    let use_color = settings
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);
    settings.logging.color = use_color;

    if let Err(e) = init_logging(&settings.logging) {
        eprintln!("Error: {}", e);
        return EXIT_FAILURE;
    }

    log::info!("arcai-scan {} starting", version::version());
    if let Some(path) = &settings.source {
        log::debug!("Configuration loaded from {}", path.display());
    }
    log::debug!("Scanner configuration: {:?}", settings.scanner);

    let coordinator = Arc::new(ScanCoordinator::new(settings.scanner));
    let shutdown = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();

    match &args.command {
        Command::List(list_args) => run_list(&coordinator, list_args, use_color).await,
        Command::Scan(scan_args) => {
            run_scan(Arc::clone(&coordinator), scan_args, &shutdown, use_color).await
        }
    }
}
