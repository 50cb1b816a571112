//! Matriz Server
//!
//! Empresa registry API and the live event relay, as two subcommands of
//! one binary.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ApiArgs, Cli, Command, EventsArgs};
use matriz_core::events::{AmqpPublisher, EventPublisher, Notifier, QueueConfig, QueueConsumer};
use matriz_core::hub::Hub;
use matriz_core::processors::EmpresaService;
use matriz_core::store::{MongoEmpresaStore, MongoStoreConfig};
use server::{build_api_router, build_events_router, run_server, run_server_until};
use shutdown::shutdown_signal;
use state::{AppState, EventsState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    init_tracing();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {:?}", path);
    }

    let cli = Cli::parse();

    tracing::info!("Starting matriz-server v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Api(args) => run_api(args).await,
        Command::Events(args) => run_events(args).await,
    }
}

async fn run_api(args: ApiArgs) -> anyhow::Result<()> {
    let store_config = MongoStoreConfig::from(&args.store);
    tracing::info!(
        "Connecting to MongoDB ({}/{})...",
        store_config.database,
        store_config.collection
    );
    let store = MongoEmpresaStore::connect(&store_config)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            e
        })?;
    tracing::info!("MongoDB connection established");

    let queue_config = QueueConfig::from(&args.queue);
    let publisher = match AmqpPublisher::connect(&queue_config).await {
        Ok(publisher) => {
            tracing::info!("Publishing events to queue {}", queue_config.queue);
            Some(Arc::new(publisher))
        }
        Err(e) => {
            tracing::warn!("RabbitMQ unavailable, events will not be published: {}", e);
            None
        }
    };
    let notifier = Notifier::new(
        publisher
            .clone()
            .map(|p| p as Arc<dyn EventPublisher>),
    );

    tracing::info!(
        notifications = notifier.is_enabled(),
        "Empresa service ready"
    );
    let service = EmpresaService::new(Arc::new(store), notifier);
    let router = build_api_router(AppState::new(service));

    let listen_addr = args.listen_addr();
    tracing::info!("Starting HTTP API on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    if let Some(publisher) = publisher {
        tracing::info!("Closing RabbitMQ publisher...");
        publisher.close().await;
    }
    tracing::info!("API shutdown complete");

    result.map_err(Into::into)
}

async fn run_events(args: EventsArgs) -> anyhow::Result<()> {
    let (hub, _hub_task) = Hub::spawn(args.buffer);
    let consumer_hub = hub.clone();

    let queue_config = QueueConfig::from(&args.queue);
    let consumer = QueueConsumer::connect(&queue_config).await.map_err(|e| {
        tracing::error!("Failed to start queue consumer: {}", e);
        e
    })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (stopped_tx, stopped_rx) = oneshot::channel::<()>();
    let consumer_task = tokio::spawn(async move {
        let result = consumer.run(consumer_hub, shutdown_rx).await;
        let _ = stopped_tx.send(());
        result
    });

    let origins = args.origins();
    if origins.is_empty() {
        tracing::warn!("WS_ALLOWED_ORIGINS is empty, accepting websocket clients from any origin");
    }
    let router = build_events_router(EventsState::new(hub, origins));

    // Stop serving once the consumer ends.
    let stop = async move {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = stopped_rx => tracing::warn!("Queue consumer stopped, shutting down events server"),
        }
    };

    tracing::info!("Starting events server on {}", args.listen);
    let result = run_server_until(router, args.listen, stop).await;

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(Duration::from_secs(5), consumer_task).await {
        Ok(Ok(Ok(forwarded))) => {
            tracing::info!("Queue consumer stopped after {} messages", forwarded)
        }
        Ok(Ok(Err(e))) => tracing::warn!("Queue consumer ended with error: {}", e),
        Ok(Err(e)) => tracing::error!("Queue consumer task failed: {}", e),
        Err(_) => tracing::warn!("Queue consumer did not stop in time"),
    }
    tracing::info!("Events shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
