//! Runs the order-service and notification-service consumer groups against
//! the payments topic.

use {
    payment_outbox::{
        domain::{event::TOPIC_PAYMENTS, ports::IdempotencyStore},
        infra::{
            kafka::consumer::KafkaEventConsumer,
            memory::MemoryIdempotencyStore,
            postgres::order_repo::PgOrderStatusRepository,
            redis::idempotency::{DEFAULT_TTL, RedisIdempotencyStore},
        },
        services::consumers::{
            EventHandler, LogNotifier, NOTIFICATION_SERVICE_GROUP, NotificationHandler,
            ORDER_SERVICE_GROUP, OrderPaymentHandler,
        },
    },
    sqlx::postgres::PgPoolOptions,
    std::{env, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "127.0.0.1:9092".into());
    let topic = env::var("PAYMENTS_TOPIC").unwrap_or_else(|_| TOPIC_PAYMENTS.into());
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    tracing::info!("postgres connected");

    // Redis dedupes notifications across restarts when configured.
    let sent: Arc<dyn IdempotencyStore> = match env::var("REDIS_URL") {
        Ok(url) => Arc::new(
            RedisIdempotencyStore::connect(&url, DEFAULT_TTL)
                .await
                .expect("failed to connect to redis"),
        ),
        Err(_) => {
            tracing::warn!("REDIS_URL not set, deduplicating notifications in memory");
            Arc::new(MemoryIdempotencyStore::new(DEFAULT_TTL))
        }
    };

    let order_book = Arc::new(PgOrderStatusRepository::new(pool.clone()));
    let orders: Arc<dyn EventHandler> = Arc::new(OrderPaymentHandler::new(order_book));
    let notifications: Arc<dyn EventHandler> =
        Arc::new(NotificationHandler::new(Arc::new(LogNotifier), sent));

    let order_consumer = KafkaEventConsumer::new(&brokers, ORDER_SERVICE_GROUP, &topic)
        .expect("failed to create order consumer");
    let notification_consumer =
        KafkaEventConsumer::new(&brokers, NOTIFICATION_SERVICE_GROUP, &topic)
            .expect("failed to create notification consumer");

    let (shutdown, rx) = watch::channel(false);
    let order_task = tokio::spawn({
        let rx = rx.clone();
        async move { order_consumer.run(orders, rx).await }
    });
    let notification_task =
        tokio::spawn(async move { notification_consumer.run(notifications, rx).await });

    signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    tracing::info!("received ctrl+c, stopping consumers");
    let _ = shutdown.send(true);

    for task in [order_task, notification_task] {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "consumer task failed");
        }
    }
    pool.close().await;
}
