//! devloop - incremental rebuild and hot-reload for multi-module JVM web projects.

mod analysis;
mod build;
mod cli;
mod config;
mod core;
mod logger;
mod project;
mod reloader;
mod server;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{DevloopConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = init_config(DevloopConfig::load(&cli)?);
    debug!("config"; "{} modules from {}", config.modules.len(), config.config_path.display());

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(&config),
        Commands::Build => cli::build::build_once(&config),
        Commands::Scope { paths } => cli::scope::print_scope(&config, paths),
    }
}
