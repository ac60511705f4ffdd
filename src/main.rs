//! dcpp-rs
//!
//! Hublist auto-registration tool.
//!
//! Usage:
//!   Hublist server:  dcpp-rs serve --listen 0.0.0.0:2501
//!   Register a hub:  dcpp-rs register --hublist hublist.example.org --name MyHub --host hub.example.org:411

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dcpp_autoreg::{register, Server};
use dcpp_rs::config::{load_config, RegisterSection};
use dcpp_rs::MemoryRegistry;
use log::info;
use tokio::net::TcpListener;
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "dcpp-rs")]
#[command(version)]
#[command(about = "Direct Connect hublist auto-registration")]
struct Args {
    /// Path to config file (default: ~/.config/dcpp-rs/dcpp.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a hublist registration server
    Serve {
        /// Address to listen on (e.g., 0.0.0.0:2501)
        #[arg(short, long)]
        listen: Option<String>,

        /// Seconds a connection may take to complete its registration
        #[arg(long)]
        handshake_timeout: Option<u64>,

        /// Send a random lock challenge on every connection
        #[arg(long)]
        random_lock: bool,
    },
    /// Register a hub on a hublist
    Register {
        /// Hublist address (host, host:port or dchub://host:port)
        #[arg(long)]
        hublist: Option<String>,

        /// Hub name
        #[arg(long)]
        name: Option<String>,

        /// Hub address as users should dial it (host:port)
        #[arg(long)]
        host: Option<String>,

        /// Hub description
        #[arg(long)]
        description: Option<String>,

        /// Current user count
        #[arg(long)]
        users: Option<u32>,

        /// Total share in bytes
        #[arg(long)]
        share: Option<u64>,

        /// Seconds allowed for the whole registration
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.mode {
        Mode::Serve {
            listen,
            handshake_timeout,
            random_lock,
        } => {
            let mut section = config.server;
            if let Some(listen) = listen {
                section.listen = listen;
            }
            if let Some(secs) = handshake_timeout {
                section.handshake_timeout_secs = secs;
            }
            section.random_lock |= random_lock;
            section.validate()?;

            let listener = TcpListener::bind(&section.listen)
                .await
                .with_context(|| format!("Failed to bind {}", section.listen))?;
            let server = Server::with_config(MemoryRegistry::new(), section.to_server_config());
            server.serve(listener).await?;
        }
        Mode::Register {
            hublist,
            name,
            host,
            description,
            users,
            share,
            timeout,
        } => {
            let mut section: RegisterSection = config.register.unwrap_or_default();
            if let Some(v) = hublist {
                section.hublist = v;
            }
            if let Some(v) = name {
                section.name = v;
            }
            if let Some(v) = host {
                section.host = v;
            }
            if let Some(v) = description {
                section.description = v;
            }
            if let Some(v) = users {
                section.users = v;
            }
            if let Some(v) = share {
                section.share = v;
            }
            if let Some(v) = timeout {
                section.timeout_secs = v;
            }
            section.validate()?;

            let deadline = Instant::now() + section.timeout();
            register(&section.hublist, &section.hub_info(), Some(deadline))
                .await
                .with_context(|| format!("Registration on {} failed", section.hublist))?;
            info!("Registered '{}' on {}", section.name, section.hublist);
        }
    }

    Ok(())
}
