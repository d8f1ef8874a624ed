//! In-process adapters for every port. They keep the same atomicity and
//! claim semantics as the postgres/redis/kafka adapters, which lets the
//! processor, poller and consumers run without external services.

use {
    crate::domain::error::PipelineError,
    crate::domain::event::{Envelope, OutboxEvent},
    crate::domain::id::{IdempotencyKey, OrderReference},
    crate::domain::payment::Payment,
    crate::domain::ports::{
        BoxFuture, EventProducer, IdempotencyStore, OutboxStore, OutboxWriter, PaymentLedger,
        UnitOfWork,
    },
    crate::services::consumers::{OrderStatus, OrderStatusRepository},
    chrono::{DateTime, Utc},
    std::{
        collections::HashMap,
        sync::{Mutex, MutexGuard, PoisonError},
        time::{Duration, Instant},
    },
    uuid::Uuid,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Idempotency ────────────────────────────────────────────────────────────

pub struct MemoryIdempotencyStore {
    ttl: Duration,
    keys: Mutex<HashMap<String, Held>>,
}

#[derive(Debug, Clone, Copy)]
struct Held {
    token: Uuid,
    expires: Instant,
}

impl MemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        lock(&self.keys)
            .get(key.as_str())
            .is_some_and(|held| held.expires > Instant::now())
    }

    /// Live and expired-but-not-yet-pruned entries.
    pub fn len(&self) -> usize {
        lock(&self.keys).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn try_reserve<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<bool, PipelineError>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = lock(&self.keys);
            if keys.get(key.as_str()).is_some_and(|held| held.expires > now) {
                return Ok(false);
            }

            keys.retain(|_, held| held.expires > now);
            keys.insert(
                key.as_str().to_string(),
                Held {
                    token,
                    expires: now + self.ttl,
                },
            );
            Ok(true)
        })
    }

    fn release<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let mut keys = lock(&self.keys);
            if keys.get(key.as_str()).is_some_and(|held| held.token == token) {
                keys.remove(key.as_str());
            }
            Ok(())
        })
    }
}

// ── Ledger + outbox ────────────────────────────────────────────────────────

/// Writes staged by a transaction; applied together on commit.
#[derive(Debug, Default)]
pub struct MemoryTx {
    payments: Vec<Payment>,
    events: Vec<OutboxEvent>,
}

#[derive(Debug, Clone)]
struct StoredEvent {
    event: OutboxEvent,
    locked_until: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tables {
    payments: Vec<Payment>,
    outbox: Vec<StoredEvent>,
}

/// Payments and outbox tables sharing one commit point.
pub struct MemoryDatabase {
    claim_ttl: Duration,
    tables: Mutex<Tables>,
}

impl MemoryDatabase {
    pub fn new(claim_ttl: Duration) -> Self {
        Self {
            claim_ttl,
            tables: Mutex::new(Tables::default()),
        }
    }

    pub fn payments(&self) -> Vec<Payment> {
        lock(&self.tables).payments.clone()
    }

    pub fn outbox(&self) -> Vec<OutboxEvent> {
        lock(&self.tables)
            .outbox
            .iter()
            .map(|row| row.event.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.tables)
            .outbox
            .iter()
            .filter(|row| row.event.is_pending())
            .count()
    }

    /// Apply every write staged in `tx` at once.
    pub fn commit(&self, tx: MemoryTx) {
        let mut tables = lock(&self.tables);
        tables.payments.extend(tx.payments);
        tables
            .outbox
            .extend(tx.events.into_iter().map(|event| StoredEvent {
                event,
                locked_until: None,
            }));
    }

    fn claim_lease(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.claim_ttl).unwrap_or_else(|_| chrono::Duration::days(1))
    }
}

impl UnitOfWork for MemoryDatabase {
    type Tx = MemoryTx;

    fn within_transaction<'a, T, F>(&'a self, f: F) -> BoxFuture<'a, Result<T, PipelineError>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut MemoryTx) -> BoxFuture<'t, Result<T, PipelineError>> + Send + 'a,
    {
        Box::pin(async move {
            let mut tx = MemoryTx::default();
            let value = f(&mut tx).await?;
            self.commit(tx);
            Ok(value)
        })
    }
}

impl PaymentLedger<MemoryTx> for MemoryDatabase {
    fn create<'a>(
        &'a self,
        tx: &'a mut MemoryTx,
        payment: &'a Payment,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            tx.payments.push(payment.clone());
            Ok(())
        })
    }
}

impl OutboxWriter<MemoryTx> for MemoryDatabase {
    fn write<'a>(
        &'a self,
        tx: &'a mut MemoryTx,
        event: &'a OutboxEvent,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let duplicate = tx.events.iter().any(|e| e.event_id == event.event_id)
                || lock(&self.tables)
                    .outbox
                    .iter()
                    .any(|row| row.event.event_id == event.event_id);
            if duplicate {
                return Err(PipelineError::Infrastructure(format!(
                    "outbox primary key violation: {}",
                    event.event_id
                )));
            }
            tx.events.push(event.clone());
            Ok(())
        })
    }
}

impl OutboxStore for MemoryDatabase {
    fn fetch_pending(&self, limit: usize) -> BoxFuture<'_, Result<Vec<OutboxEvent>, PipelineError>> {
        Box::pin(async move {
            let now = Utc::now();
            let lease = now + self.claim_lease();
            let mut tables = lock(&self.tables);

            let mut claimable: Vec<&mut StoredEvent> = tables
                .outbox
                .iter_mut()
                .filter(|row| row.event.is_pending())
                .filter(|row| row.locked_until.is_none_or(|until| until < now))
                .collect();
            claimable.sort_by_key(|row| (row.event.timestamp, row.event.event_id));

            Ok(claimable
                .into_iter()
                .take(limit)
                .map(|row| {
                    row.locked_until = Some(lease);
                    row.event.clone()
                })
                .collect())
        })
    }

    fn mark_published(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>> {
        Box::pin(async move {
            let mut tables = lock(&self.tables);
            if let Some(row) = tables.outbox.iter_mut().find(|r| r.event.event_id == event_id) {
                row.event.published_at.get_or_insert_with(Utc::now);
                row.locked_until = None;
            }
            Ok(())
        })
    }

    fn release_claim(&self, event_id: Uuid) -> BoxFuture<'_, Result<(), PipelineError>> {
        Box::pin(async move {
            let mut tables = lock(&self.tables);
            if let Some(row) = tables
                .outbox
                .iter_mut()
                .find(|r| r.event.event_id == event_id && r.event.is_pending())
            {
                row.locked_until = None;
            }
            Ok(())
        })
    }
}

// ── Orders ─────────────────────────────────────────────────────────────────

/// Order status table kept in process.
#[derive(Default)]
pub struct MemoryOrderBook {
    orders: Mutex<HashMap<OrderReference, OrderStatus>>,
}

impl MemoryOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: OrderReference) {
        lock(&self.orders).insert(order, OrderStatus::Created);
    }

    pub fn status(&self, order: OrderReference) -> Option<OrderStatus> {
        lock(&self.orders).get(&order).copied()
    }
}

impl OrderStatusRepository for MemoryOrderBook {
    fn mark_paid(&self, order: OrderReference) -> BoxFuture<'_, Result<bool, PipelineError>> {
        Box::pin(async move {
            let mut orders = lock(&self.orders);
            match orders.get_mut(&order) {
                Some(OrderStatus::Paid) => Ok(false),
                Some(status) => {
                    *status = OrderStatus::Paid;
                    Ok(true)
                }
                None => Err(PipelineError::Validation(format!("unknown order: {order}"))),
            }
        })
    }
}

// ── Broker ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// Append-only log of published records, one per `publish` call.
#[derive(Default)]
pub struct MemoryBroker {
    records: Mutex<Vec<BrokerRecord>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<BrokerRecord> {
        lock(&self.records).clone()
    }

    pub fn records_for(&self, topic: &str) -> Vec<BrokerRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.topic == topic)
            .cloned()
            .collect()
    }
}

impl EventProducer for MemoryBroker {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        event_type: &'a str,
        event_id: Uuid,
        timestamp: DateTime<Utc>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let value = Envelope::new(event_type, event_id, timestamp, payload).encode()?;
            lock(&self.records).push(BrokerRecord {
                topic: topic.to_string(),
                key: event_id.to_string(),
                value,
            });
            Ok(())
        })
    }
}
