// src/main.rs

//! Entry point for the three Lunaricorn core role binaries: the cluster
//! registrar (`leader`), the signaling hub, and the object store
//! (`orb`). Each role is the same binary started with a different
//! subcommand and configuration file, mirroring the single-binary,
//! mode-selected-by-flag shape of the process this was adapted from.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[derive(Parser)]
#[command(name = "lunaricorn", version, about = "Lunaricorn cluster core")]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Run the cluster registrar (beacons, readiness, monotonic ids).
    Leader {
        #[arg(long, default_value = "leader_config.yaml")]
        config: String,
    },
    /// Run the signaling hub (push/subscribe event bus).
    Signaling {
        #[arg(long, default_value = "signaling_config.yaml")]
        config: String,
    },
    /// Run the orb object store (RPC + HTTP).
    Orb {
        #[arg(long, default_value = "orb_config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A reloadable filter layer, mirroring the teacher's runtime log-level
    // switch even though no role currently exposes a command to flip it.
    let initial_log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let (filter, _reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    let result = match cli.role {
        Role::Leader { config } => lunaricorn::leader::run(&config).await,
        Role::Signaling { config } => lunaricorn::signaling::run(&config).await,
        Role::Orb { config } => lunaricorn::orb::run(&config).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "role runtime error");
    }
    result
}
