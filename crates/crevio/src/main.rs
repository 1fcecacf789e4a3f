// SPDX-FileCopyrightText: 2026 Crevio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crevio - a conversational assistant for content creators.
//!
//! Binary entry point: loads and validates configuration, then dispatches
//! to the requested subcommand.

use clap::{Parser, Subcommand};

mod serve;

/// Crevio - a conversational assistant for content creators.
#[derive(Parser, Debug)]
#[command(name = "crevio", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Crevio assistant server.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match crevio_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            for error in &errors {
                eprintln!("crevio: configuration error: {error}");
            }
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("crevio serve: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("crevio: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Pinned to compiled defaults; host config files and env vars do
        // not participate.
        let config = crevio_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.agent.name, "crevio");
        assert_eq!(config.gateway.port, 8090);
    }
}
