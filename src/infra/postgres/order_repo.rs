use {
    crate::domain::error::PipelineError,
    crate::domain::id::OrderReference,
    crate::domain::ports::BoxFuture,
    crate::services::consumers::{OrderStatus, OrderStatusRepository},
    sqlx::PgPool,
};

/// Order status table owned by the order service.
#[derive(Clone)]
pub struct PgOrderStatusRepository {
    pool: PgPool,
}

impl PgOrderStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Register a new order in `created` state. Re-inserting is a no-op.
pub async fn insert_order(pool: &PgPool, order: OrderReference) -> Result<(), PipelineError> {
    sqlx::query("INSERT INTO orders (order_reference) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(order.as_uuid())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_status(
    pool: &PgPool,
    order: OrderReference,
) -> Result<Option<OrderStatus>, PipelineError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status FROM orders WHERE order_reference = $1")
            .bind(order.as_uuid())
            .fetch_optional(pool)
            .await?;

    status.as_deref().map(OrderStatus::try_from).transpose()
}

/// `Ok(true)` when this call moved the order to paid, `Ok(false)` when it
/// already was. Unknown orders are an error.
pub async fn mark_paid(pool: &PgPool, order: OrderReference) -> Result<bool, PipelineError> {
    let updated = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'paid', updated_at = now()
        WHERE order_reference = $1 AND status <> 'paid'
        "#,
    )
    .bind(order.as_uuid())
    .execute(pool)
    .await?
    .rows_affected();

    if updated > 0 {
        return Ok(true);
    }

    match fetch_status(pool, order).await? {
        Some(_) => Ok(false),
        None => Err(PipelineError::Validation(format!("unknown order: {order}"))),
    }
}

impl OrderStatusRepository for PgOrderStatusRepository {
    fn mark_paid(&self, order: OrderReference) -> BoxFuture<'_, Result<bool, PipelineError>> {
        Box::pin(mark_paid(&self.pool, order))
    }
}
