//! sniperd binary entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sniperd::chain::RpcConnector;
use sniperd::config::Config;
use sniperd::discovery::DexScreenerClient;
use sniperd::dispatch;
use sniperd::engine::TaskEngine;
use sniperd::gateway::{self, GatewayState};
use sniperd::store::{MemoryStore, TaskStore};

#[derive(Parser)]
#[command(
    name = "sniperd",
    version,
    about = "Background execution service for signed spend permissions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway with the task store and execution engine.
    Serve,
    /// Run one trigger pass over pending tasks and wait for the results.
    Tick,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve().context("failed to resolve configuration")?;

    let store: Arc<dyn TaskStore> = Arc::new(MemoryStore::new());
    let discovery = Arc::new(
        DexScreenerClient::new(&config.discovery)
            .context("failed to build discovery client")?,
    );
    let connector = Arc::new(RpcConnector::new(
        config.chain.clone(),
        config.spender.clone(),
    ));
    let engine = Arc::new(TaskEngine::new(
        store.clone(),
        discovery,
        connector,
        config.engine.clone(),
        config.discovery.target_network.clone(),
    ));

    match cli.command {
        Command::Serve => {
            let state = Arc::new(GatewayState {
                store,
                engine,
                cron_secret: config.gateway.cron_secret.clone(),
            });
            let app = gateway::router(state);
            let listener = tokio::net::TcpListener::bind(config.gateway.bind)
                .await
                .with_context(|| format!("failed to bind {}", config.gateway.bind))?;
            tracing::info!(bind = %config.gateway.bind, "gateway listening");
            axum::serve(listener, app)
                .await
                .context("gateway server failed")?;
        }
        Command::Tick => {
            let handles = dispatch::run_pending(store, engine).await?;
            tracing::info!(dispatched = handles.len(), "trigger pass dispatched tasks");
            for handle in handles {
                match handle.await {
                    Ok(outcome) => tracing::info!(?outcome, "task finished"),
                    Err(err) => tracing::error!(error = %err, "task execution panicked"),
                }
            }
        }
    }

    Ok(())
}
