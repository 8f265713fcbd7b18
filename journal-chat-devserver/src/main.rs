//! `journal-chat-devserver` -- in-memory chat backend for local use.
//!
//! # Usage
//!
//! ```bash
//! # Run on the default address 127.0.0.1:3000 with the built-in accounts
//! cargo run --bin journal-chat-devserver
//!
//! # Custom address and seed accounts
//! cargo run --bin journal-chat-devserver -- --bind 0.0.0.0:8080 --seed seed.toml
//! ```

use std::sync::Arc;

use clap::Parser;
use journal_chat_devserver::config::{DevCliArgs, DevServerConfig};
use journal_chat_devserver::server;
use journal_chat_devserver::state::DevState;

#[tokio::main]
async fn main() {
    let cli = DevCliArgs::parse();

    let config = match DevServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let seed = match config.seed() {
        Ok(seed) => seed,
        Err(e) => {
            tracing::error!(error = %e, "failed to load seed accounts");
            std::process::exit(1);
        }
    };
    for user in &seed {
        tracing::info!(
            actor_id = %user.actor.id,
            role = %user.actor.role,
            username = %user.actor.username,
            "seeded account"
        );
    }

    let state = Arc::new(DevState::new(seed));
    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "dev server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "dev server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start dev server");
            std::process::exit(1);
        }
    }
}
