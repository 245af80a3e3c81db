//! norup - firmware-image management harness for CFI NOR flash
//!
//! Host-side front end for the update core. The core itself is `no_std`
//! and runs on the target; this binary binds it to the in-memory device
//! simulators from `norup-sim` so the probe, erase, transfer, and
//! boot-check flows can be exercised and demonstrated without a board
//! attached.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info => commands::info::run(),
        Commands::Erase { offset, chip } => commands::erase::run(offset, chip),
        Commands::Put { input, resource } => commands::xfer::run_put(&input, &resource),
        Commands::Get {
            resource,
            output,
            preload,
        } => commands::xfer::run_get(&resource, &output, preload.as_deref()),
        Commands::Bootcheck {
            image,
            force_update,
        } => commands::bootcheck::run(image.as_deref(), force_update),
    }
}
