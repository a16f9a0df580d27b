// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stowage - subscription reconciliation and barcode lookup for a home
//! inventory app.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod lookup;
mod serve;
mod sweep;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stowage_config::StowageConfig;

/// Stowage - subscription reconciliation and barcode lookup service.
#[derive(Parser, Debug)]
#[command(name = "stowage", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and the retry sweeper.
    Serve,
    /// Run one retry sweep against the database and exit.
    Sweep {
        /// Maximum due entries to process (defaults to retry.sweep_batch_size).
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Look up a barcode or ISBN through the provider chain.
    Lookup {
        /// The UPC, EAN, or ISBN-13 to resolve.
        code: String,
        /// Print the product as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Manage Stowage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration and print the effective settings.
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => stowage_config::load_and_validate_path(path),
        None => stowage_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            stowage_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Sweep { limit }) => sweep::run_sweep(config, limit).await,
        Some(Commands::Lookup { code, json }) => lookup::run_lookup(config, &code, json).await,
        Some(Commands::Config {
            action: ConfigCommands::Check,
        }) => {
            print_config_summary(&config);
            Ok(())
        }
        None => {
            println!("stowage: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("stowage: {e}");
        std::process::exit(1);
    }
}

fn print_config_summary(config: &StowageConfig) {
    println!("configuration is valid");
    println!("  service.name        = {}", config.service.name);
    println!("  server              = {}:{}", config.server.host, config.server.port);
    println!("  storage.database    = {}", config.storage.database_path);
    println!("  retry.max_attempts  = {}", config.retry.max_attempts);
    println!("  lookup.cache_ttl    = {} days", config.lookup.cache_ttl_days);
    println!("  prometheus.enabled  = {}", config.prometheus.enabled);
}
