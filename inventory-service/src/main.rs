use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use diesel::PgConnection;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

use anyhow::Result;
use clap::Parser;
use diesel::Connection;
use inventory_service::config::Args;
use inventory_service::gateway::{create_consumer, create_producer};
use inventory_service::{api, EventGateway, KafkaPublisher, PgStore, ReservationEngine, SagaOrchestrator};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // Run migrations first
    info!("Running database migrations...");
    let mut conn = PgConnection::establish(&args.database_url)?;
    conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Migrations completed successfully");

    let store = Arc::new(PgStore::connect(&args.database_url, args.db_pool_size).await?);
    let engine = ReservationEngine::new(store);

    let gateway_config = args.gateway();
    let producer = create_producer(&gateway_config)?;
    let consumer = create_consumer(&gateway_config)?;

    let publisher = KafkaPublisher::new(
        producer,
        gateway_config.outbound_topic.clone(),
        gateway_config.publish_timeout,
    );
    let gateway = EventGateway::new(
        SagaOrchestrator::new(engine.clone()),
        publisher,
        gateway_config.retry_backoff,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway_task = tokio::spawn(async move {
        gateway.run(consumer, shutdown_rx).await;
    });
    info!(
        topic = %gateway_config.inbound_topic,
        group = %gateway_config.consumer_group,
        "Consuming order events"
    );

    let app = api::create_router(engine);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    info!("Inventory service web server started on port {}", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = gateway_task.await {
        error!("Event gateway task failed: {}", e);
    }
    info!("Inventory service stopped");

    Ok(())
}
