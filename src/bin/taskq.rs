//! taskq CLI: run the dispatch server or maintain the completion store.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use taskq::config::{Config, DEFAULT_DATABASE_URL};
use taskq::engine::Dispatcher;
use taskq::oracle::RandomOracle;
use taskq::store::{CompletionStore, SqliteStore};
use taskq::telemetry::{TelemetryConfig, init_telemetry};
use tracing::info;

#[derive(Parser)]
#[command(name = "taskq", about = "Task dispatch and retry engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP dispatch server
    Serve {
        /// Execution mode: "async" (concurrent) or "sync" (sequential)
        mode: String,
        /// Failure threshold, 0-100
        threshold: String,
    },
    /// Completion store maintenance
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// List completed task ids
    List,
    /// Count completed tasks
    Count,
    /// Delete every completion record
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { mode, threshold } => cmd_serve(&mode, &threshold).await,
        Command::Store { action } => {
            let url =
                std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
            let store = SqliteStore::open(&url).await?;
            match action {
                StoreAction::List => {
                    let ids = store.entries().await?;
                    if ids.is_empty() {
                        println!("No completed tasks.");
                    }
                    for id in &ids {
                        println!("{id}");
                    }
                }
                StoreAction::Count => println!("{}", store.count().await?),
                StoreAction::Clear => {
                    let n = store.count().await?;
                    store.clear().await?;
                    println!("Cleared {n} record(s).");
                }
            }
            store.close().await;
            Ok(())
        }
    }
}

async fn cmd_serve(mode: &str, threshold: &str) -> anyhow::Result<()> {
    let config = Config::resolve(mode, threshold)?;

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "taskq".to_string(),
        default_level: config.log_level.clone(),
    })?;

    let store = SqliteStore::open(config.database_url.expose_secret()).await?;
    store.health_check().await?;

    let dispatcher = Arc::new(Dispatcher::new(
        config.executor.clone(),
        Arc::new(store),
        Arc::new(RandomOracle::new()),
    ));
    let worker = dispatcher.start()?;

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(
        mode = %config.executor.mode,
        threshold = config.executor.failure_threshold,
        "starting server"
    );

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };
    taskq::http::serve(listener, Arc::clone(&dispatcher), shutdown).await?;

    dispatcher.shutdown();
    worker.await?;
    info!(in_flight = dispatcher.in_flight(), "executor drained");
    guard.force_flush();
    Ok(())
}
