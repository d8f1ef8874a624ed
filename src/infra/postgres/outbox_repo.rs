use {
    super::PgTx,
    crate::domain::error::PipelineError,
    crate::domain::event::OutboxEvent,
    crate::domain::ports::{BoxFuture, OutboxStore, OutboxWriter},
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    std::time::Duration,
    uuid::Uuid,
};

#[derive(Debug, sqlx::FromRow)]
pub struct OutboxRow {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for OutboxEvent {
    fn from(row: OutboxRow) -> Self {
        Self {
            event_id: row.id,
            event_type: row.event_type,
            timestamp: row.created_at,
            payload: row.payload,
            published_at: row.published_at,
        }
    }
}

#[derive(Clone)]
pub struct PgOutboxRepo {
    pool: PgPool,
    claim_ttl: Duration,
}

impl PgOutboxRepo {
    pub fn new(pool: PgPool, claim_ttl: Duration) -> Self {
        Self { pool, claim_ttl }
    }
}

pub async fn insert_event(tx: &mut PgTx, event: &OutboxEvent) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO outbox (id, event_type, payload, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(event.event_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(event.timestamp)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Claim up to `limit` pending events for this poller.
/// SKIP LOCKED keeps concurrent pollers off each other's rows; the lease
/// hides claimed rows until it expires.
pub async fn claim_pending(
    pool: &PgPool,
    limit: i64,
    claim_ttl: Duration,
) -> Result<Vec<OutboxEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, OutboxRow>(
        r#"
        UPDATE outbox
        SET locked_until = now() + make_interval(secs => $2)
        WHERE id IN (
            SELECT id FROM outbox
            WHERE published_at IS NULL
              AND (locked_until IS NULL OR locked_until < now())
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, event_type, payload, created_at, published_at
        "#,
    )
    .bind(limit)
    .bind(claim_ttl.as_secs_f64())
    .fetch_all(pool)
    .await?;

    // RETURNING does not preserve the subquery order.
    let mut events: Vec<OutboxEvent> = rows.into_iter().map(OutboxEvent::from).collect();
    events.sort_by_key(|e| (e.timestamp, e.event_id));
    Ok(events)
}

pub async fn mark_published(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        UPDATE outbox
        SET published_at = COALESCE(published_at, now()), locked_until = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn release_claim(pool: &PgPool, id: Uuid) -> Result<(), PipelineError> {
    sqlx::query("UPDATE outbox SET locked_until = NULL WHERE id = $1 AND published_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

impl OutboxWriter<PgTx> for PgOutboxRepo {
    fn write<'a>(
        &'a self,
        tx: &'a mut PgTx,
        event: &'a OutboxEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(insert_event(tx, event))
    }
}

impl OutboxStore for PgOutboxRepo {
    fn fetch_pending(&self, limit: usize) -> BoxFuture<'_, Result<Vec<OutboxEvent>, PipelineError>> {
        Box::pin(async move {
            let limit = i64::try_from(limit)
                .map_err(|_| PipelineError::Validation(format!("batch size too large: {limit}")))?;
            claim_pending(&self.pool, limit, self.claim_ttl).await
        })
    }

    fn mark_published(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>> {
        Box::pin(mark_published(&self.pool, event_id))
    }

    fn release_claim(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>> {
        Box::pin(release_claim(&self.pool, event_id))
    }
}
