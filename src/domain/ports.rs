use {
    super::error::PipelineError,
    super::event::OutboxEvent,
    super::id::IdempotencyKey,
    super::payment::Payment,
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
    uuid::Uuid,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Atomic test-and-set registry of idempotency keys with a TTL.
///
/// Every reservation carries the caller's `token`. A release only removes
/// the key while it still holds that token, so a late or repeated release
/// can never free a key reserved by someone else.
pub trait IdempotencyStore: Send + Sync {
    /// Creates the record if absent. `true` means this call created it.
    fn try_reserve<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<bool, PipelineError>>;

    /// Drops a reservation whose guarded action did not take effect.
    fn release<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Runs a function inside one atomic transaction.
///
/// The active transaction is handed to `f` as `&mut Self::Tx` and must be
/// passed explicitly to every repository write made inside it. The
/// transaction commits when `f` returns `Ok`, and rolls back on `Err`, on
/// panic, or when the returned future is dropped before the commit starts.
/// A commit that has started runs to completion even if the caller goes away.
pub trait UnitOfWork: Send + Sync + 'static {
    type Tx: Send + 'static;

    fn within_transaction<'a, T, F>(&'a self, f: F) -> BoxFuture<'a, Result<T, PipelineError>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut Self::Tx) -> BoxFuture<'t, Result<T, PipelineError>> + Send + 'a;
}

/// Append-only ledger of committed payments.
pub trait PaymentLedger<Tx>: Send + Sync {
    fn create<'a>(
        &'a self,
        tx: &'a mut Tx,
        payment: &'a Payment,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Transactional half of the outbox: called inside a unit of work.
pub trait OutboxWriter<Tx>: Send + Sync {
    fn write<'a>(
        &'a self,
        tx: &'a mut Tx,
        event: &'a OutboxEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Relay half of the outbox: called by pollers, outside any transaction.
/// Safe to run from several processes against the same table.
pub trait OutboxStore: Send + Sync {
    /// Claims up to `limit` pending events, oldest first. Claimed events are
    /// hidden from other pollers until published, released, or the claim
    /// lease expires.
    fn fetch_pending(&self, limit: usize) -> BoxFuture<'_, Result<Vec<OutboxEvent>, PipelineError>>;

    /// Idempotent: the first publication time wins.
    fn mark_published(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>>;

    /// Gives a claimed, still pending event back to the next fetch.
    fn release_claim(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>>;
}

/// Publishes serialized events to the broker. Never marks anything delivered.
pub trait EventProducer: Send + Sync {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        event_type: &'a str,
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}
