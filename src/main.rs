use std::sync::Arc;
use std::thread;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_service::api::start_api_server;
use order_service::config::Config;
use order_service::consumer::OrderConsumer;
use order_service::metrics::{start_metrics_server, Metrics};
use order_service::service::OrderService;
use order_service::storage::{self, PgOrderStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug")),
        )
        .init();

    let config = Config::from_env();

    // === 1. Storage ===
    let pool = storage::connect(&config.postgres).await?;
    let repo = Arc::new(PgOrderStore::new(pool));

    // === 2. Metrics registry + scrape endpoint ===
    let metrics = Arc::new(Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.http.metrics_port;
    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async {
            if let Err(err) = start_metrics_server(registry, metrics_port).await {
                tracing::error!(error = %err, "metrics server error");
            }
        });
    });

    // === 3. Cache service (cold-loads from storage) ===
    let service = Arc::new(OrderService::new(repo, metrics.clone()).await);

    // === 4. Stream consumer ===
    let consumer = Arc::new(OrderConsumer::new(
        &config.kafka,
        service.clone(),
        metrics.clone(),
    )?);
    let gate = consumer.readiness();
    let cancel = CancellationToken::new();
    let consumer_task = tokio::spawn({
        let consumer = consumer.clone();
        let cancel = cancel.clone();
        async move { consumer.run(cancel).await }
    });

    // === 5. Gate the API on the first partition assignment ===
    tracing::info!("waiting for initial partition assignment");
    gate.opened().await;
    tracing::info!("consumer ready, starting api server");

    start_api_server(service, gate, config.http.port).await?;

    // api server returned (SIGINT): wind the consumer down
    cancel.cancel();
    if let Err(err) = consumer_task.await {
        tracing::error!(error = %err, "consumer task join failed");
    }
    tracing::info!("shutdown complete");

    Ok(())
}
