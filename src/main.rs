use {
    payment_outbox::{
        AppState,
        adapters::http::router,
        config::Config,
        infra::{
            kafka::producer::KafkaEventProducer,
            postgres::{
                outbox_repo::PgOutboxRepo, payment_repo::PgPaymentRepo,
                unit_of_work::PgUnitOfWork,
            },
            redis::idempotency::RedisIdempotencyStore,
        },
        services::{
            outbox_poller::{OutboxPoller, PollerConfig},
            payment_processor::PaymentProcessor,
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::signal,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    tracing::info!("postgres connected");

    let idempotency = RedisIdempotencyStore::connect(&config.redis_url, config.idempotency_ttl)
        .await
        .expect("failed to connect to redis");
    tracing::info!(url = %config.redis_url, "redis connected");

    let producer =
        KafkaEventProducer::new(&config.kafka_brokers).expect("failed to create kafka producer");
    tracing::info!(brokers = %config.kafka_brokers, "kafka producer initialized");

    let outbox = Arc::new(PgOutboxRepo::new(pool.clone(), config.claim_ttl));

    let poller = OutboxPoller::new(
        outbox.clone(),
        Arc::new(producer),
        PollerConfig {
            topic: config.payments_topic.clone(),
            interval: config.poll_interval,
            batch: config.batch_size,
        },
    )
    .spawn();

    let processor = PaymentProcessor::new(
        Arc::new(PgUnitOfWork::new(pool.clone())),
        Arc::new(PgPaymentRepo::new()),
        outbox,
        Arc::new(idempotency),
    );

    let app = router(AppState {
        processor: Arc::new(processor),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Requests are drained; let the in-flight outbox tick finish too.
    poller.stop().await;
    pool.close().await;
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
