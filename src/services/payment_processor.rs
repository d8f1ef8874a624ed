use {
    crate::domain::error::PipelineError,
    crate::domain::event::OutboxEvent,
    crate::domain::id::IdempotencyKey,
    crate::domain::payment::{CommandStage, Payment, PaymentAccepted, PaymentCommand},
    crate::domain::ports::{IdempotencyStore, OutboxWriter, PaymentLedger, UnitOfWork},
    std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    uuid::Uuid,
};

/// Guard → transactional ledger+outbox write → done.
///
/// The idempotency key is reserved atomically before anything is written,
/// so two concurrent commands with the same key cannot both commit. Any
/// failure before the commit releases the reservation and the key can be
/// retried.
pub struct PaymentProcessor<U: UnitOfWork> {
    uow: Arc<U>,
    ledger: Arc<dyn PaymentLedger<U::Tx>>,
    outbox: Arc<dyn OutboxWriter<U::Tx>>,
    idempotency: Arc<dyn IdempotencyStore>,
}

impl<U: UnitOfWork> PaymentProcessor<U> {
    pub fn new(
        uow: Arc<U>,
        ledger: Arc<dyn PaymentLedger<U::Tx>>,
        outbox: Arc<dyn OutboxWriter<U::Tx>>,
        idempotency: Arc<dyn IdempotencyStore>,
    ) -> Self {
        Self {
            uow,
            ledger,
            outbox,
            idempotency,
        }
    }

    pub async fn process(&self, cmd: PaymentCommand) -> Result<PaymentAccepted, PipelineError> {
        let mut stage = CommandStage::Start;

        // 1. Guard. Armed before the SET is sent: if this future is dropped
        // while the reply is outstanding, the key is released with our token.
        let reservation = Reservation::new(
            Arc::clone(&self.idempotency),
            cmd.idempotency_key.clone(),
        );

        // Store errors abort: skipping the guard risks double charging.
        let reserved = match self
            .idempotency
            .try_reserve(&cmd.idempotency_key, reservation.token)
            .await
        {
            Ok(reserved) => reserved,
            Err(e) => return Err(reservation.abort(stage, e).await),
        };
        if !reserved {
            reservation.disarm();
            advance(stage, CommandStage::Rejected);
            tracing::info!(
                idempotency_key = %cmd.idempotency_key,
                order_reference = %cmd.order_reference,
                "duplicate payment rejected"
            );
            return Err(PipelineError::DuplicatePayment);
        }
        stage = advance(stage, CommandStage::GuardChecked);

        // 2. Commit ledger row and outbox row together.
        let payment = Payment::from_command(&cmd);
        let event = match OutboxEvent::record(&payment.succeeded_event()) {
            Ok(event) => event,
            Err(e) => return Err(reservation.abort(stage, e).await),
        };
        let event_id = event.event_id;

        let ledger = Arc::clone(&self.ledger);
        let outbox = Arc::clone(&self.outbox);
        let committing = reservation.committing_flag();

        let committed = self
            .uow
            .within_transaction(move |tx| {
                Box::pin(async move {
                    ledger.create(tx, &payment).await?;
                    outbox.write(tx, &event).await?;
                    committing.store(true, Ordering::SeqCst);
                    Ok::<_, PipelineError>(())
                })
            })
            .await;

        if let Err(e) = committed {
            return Err(reservation.abort(stage, e).await);
        }
        stage = advance(stage, CommandStage::Committed);

        // 3. The reservation was taken before the commit; it simply stays.
        reservation.disarm();
        advance(stage, CommandStage::Done);

        tracing::info!(
            event_id = %event_id,
            order_reference = %cmd.order_reference,
            user_id = %cmd.user_id,
            amount = %cmd.amount,
            "payment accepted"
        );

        Ok(PaymentAccepted { event_id })
    }
}

fn advance(from: CommandStage, to: CommandStage) -> CommandStage {
    tracing::debug!(from = %from, to = %to, "payment command stage");
    to
}

/// Live idempotency reservation, identified by a per-command token.
///
/// Dropped while still armed (request cancelled mid-flight), it releases the
/// key in the background unless the transaction body already finished: past
/// that point the commit may have gone through and the key must stay held.
struct Reservation {
    store: Arc<dyn IdempotencyStore>,
    key: Option<IdempotencyKey>,
    token: Uuid,
    committing: Arc<AtomicBool>,
}

impl Reservation {
    fn new(store: Arc<dyn IdempotencyStore>, key: IdempotencyKey) -> Self {
        Self {
            store,
            key: Some(key),
            token: Uuid::now_v7(),
            committing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn committing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.committing)
    }

    /// Stop guarding: the key is either ours for good or was never ours.
    fn disarm(mut self) {
        self.key = None;
    }

    /// Release the key so the command can be retried, returning `cause`.
    async fn abort(mut self, stage: CommandStage, cause: PipelineError) -> PipelineError {
        let Some(key) = self.key.take() else {
            return cause;
        };
        advance(stage, CommandStage::Failed);

        tracing::warn!(
            idempotency_key = %key,
            stage = %stage,
            error = %cause,
            "payment command failed, releasing idempotency key"
        );

        if let Err(e) = self.store.release(&key, self.token).await {
            tracing::error!(
                idempotency_key = %key,
                error = %e,
                "failed to release idempotency key, it stays blocked until its ttl expires"
            );
        }

        cause
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        if self.committing.load(Ordering::SeqCst) {
            tracing::warn!(
                idempotency_key = %key,
                "command cancelled during commit, keeping idempotency key"
            );
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(idempotency_key = %key, "no runtime to release idempotency key");
            return;
        };

        let store = Arc::clone(&self.store);
        let token = self.token;
        handle.spawn(async move {
            match store.release(&key, token).await {
                Ok(()) => tracing::info!(idempotency_key = %key, "released key of cancelled command"),
                Err(e) => tracing::error!(
                    idempotency_key = %key,
                    error = %e,
                    "failed to release key of cancelled command"
                ),
            }
        });
    }
}
