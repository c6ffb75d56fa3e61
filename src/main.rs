use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kameo::Actor;
use order_service::actors::{EventDispatcher, HealthMonitorActor, HealthProbe};
use order_service::api::grpc::{serve_grpc, OrderRpc};
use order_service::api::{start_api_server, AppState};
use order_service::catalog::GrpcCatalog;
use order_service::config::Config;
use order_service::domain::order::{OrderQueryService, OrderWorkflow};
use order_service::messaging::KafkaPublisher;
use order_service::metrics::{start_metrics_server, Metrics, MetricsState};
use order_service::store::PgOrderRepository;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=order_service=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_service=debug"))
        )
        .init();

    tracing::info!("🚀 Starting order service");

    let config = Config::from_env()?;
    tracing::info!(
        reservation = ?config.workflow.reservation,
        compensate_on_failure = config.workflow.compensate_on_failure,
        "Workflow configuration loaded"
    );

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Order store ===
    tracing::info!("Connecting to Postgres...");
    let store = Arc::new(PgOrderRepository::connect(&config.database).await?);
    store.migrate().await?;

    // === 3. Inventory client (with circuit breaker) ===
    let catalog = Arc::new(
        GrpcCatalog::connect_lazy(
            &config.inventory.url,
            Duration::from_millis(config.inventory.connect_timeout_ms),
            Duration::from_millis(config.inventory.request_timeout_ms),
        )?
        .with_metrics(metrics.clone()),
    );
    tracing::info!(url = %config.inventory.url, "Inventory client ready");

    // === 4. Event publication (with circuit breaker) ===
    let publisher = Arc::new(KafkaPublisher::new(&config.broker)?.with_metrics(metrics.clone()));
    let events = EventDispatcher::spawn(publisher.clone(), Some(metrics.clone()));
    tracing::info!(brokers = %config.broker.brokers, topic = %config.broker.order_created_topic, "Event publisher ready");

    // === 5. Health monitoring ===
    let probes: Vec<Arc<dyn HealthProbe>> = vec![
        store.clone() as Arc<dyn HealthProbe>,
        catalog.clone() as Arc<dyn HealthProbe>,
        publisher.clone() as Arc<dyn HealthProbe>,
    ];
    let health_monitor = HealthMonitorActor::spawn(HealthMonitorActor::new(probes, Duration::from_secs(10)));

    // === 6. Order workflow and queries ===
    let workflow = OrderWorkflow::new(
        catalog,
        store.clone(),
        events.clone(),
        metrics.clone(),
        config.workflow.clone(),
    );
    let queries = OrderQueryService::new(store, config.workflow.store_timeout);

    // === 7. Servers ===
    let state = AppState { workflow, queries };
    let api = start_api_server(state.clone(), &config.server.host, config.server.port)?;
    let grpc_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.grpc_port).parse()?;
    let grpc = serve_grpc(OrderRpc::new(state), grpc_addr);
    let metrics_server = start_metrics_server(
        MetricsState {
            registry: metrics.registry().clone(),
            health_monitor: Some(health_monitor),
        },
        &config.server.host,
        config.server.metrics_port,
    )?;

    tokio::try_join!(
        async { api.await.map_err(anyhow::Error::from) },
        async { metrics_server.await.map_err(anyhow::Error::from) },
        async { grpc.await.map_err(anyhow::Error::from) },
    )?;

    // === 8. Shutdown ===
    tracing::info!("⏳ Flushing pending order events...");
    events.drain().await;
    publisher.flush(Duration::from_secs(5));

    tracing::info!("👋 Order service stopped");

    Ok(())
}
