//! HTTP server command
//!
//! Connects the read and write clients, serves the user API until
//! Ctrl+C/SIGTERM, then disconnects both clients.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use userbase_server::{run_server, AppContext, ServerConfig};

use super::DatabaseArgs;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "USERBASE_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let settings = args
        .database
        .settings()
        .context("Invalid database settings")?;
    if settings.read_write_url.is_none() {
        tracing::warn!("DATABASE_RW_DSN not set; write endpoints will fail");
    }

    let ctx = Arc::new(AppContext::new(&settings));
    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    tracing::info!(bind = %config.bind_addr, "starting userbase server");
    ctx.run(run_server(Arc::clone(&ctx), config))
        .await
        .context("Server error")?;

    Ok(())
}
