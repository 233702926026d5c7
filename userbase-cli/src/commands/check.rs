//! Connectivity check
//!
//! Opens every configured pool, runs a trivial query through each client
//! and disconnects. Exits non-zero if anything fails.

use anyhow::{Context, Result};
use clap::Parser;
use userbase_core::DatabaseClient;
use userbase_server::AppContext;

use super::DatabaseArgs;

const PING: &str = "SELECT 1 AS ok";

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,
}

pub async fn run_check(args: CheckArgs) -> Result<()> {
    let settings = args
        .database
        .settings()
        .context("Invalid database settings")?;
    let ctx = AppContext::new(&settings);

    ctx.connect().await.context("Failed to connect")?;
    let result = ping_all(&ctx).await;
    ctx.disconnect().await;
    result?;

    println!("database reachable");
    Ok(())
}

async fn ping_all(ctx: &AppContext) -> Result<()> {
    for (label, client) in [("read", ctx.read_client()), ("write", ctx.write_client())] {
        ping(label, client).await?;
    }
    Ok(())
}

async fn ping(label: &str, client: &DatabaseClient) -> Result<()> {
    if !client.has_read_pool() && !client.has_write_pool() {
        tracing::info!(client = label, "no connection string configured, skipped");
        return Ok(());
    }

    client
        .execute_read(PING, &[])
        .await
        .with_context(|| format!("{label} client query failed"))?;
    tracing::info!(client = label, "ok");
    Ok(())
}
