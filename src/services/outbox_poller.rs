use {
    crate::domain::ports::{EventProducer, OutboxStore},
    std::{sync::Arc, time::Duration},
    tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior},
};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub topic: String,
    pub interval: Duration,
    pub batch: usize,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
}

/// Relays pending outbox events to the broker.
///
/// Each event is published, then marked published, one at a time. A crash
/// between the two leaves a published event pending and it is sent again
/// later, so delivery is at-least-once and consumers dedupe by event id.
pub struct OutboxPoller {
    store: Arc<dyn OutboxStore>,
    producer: Arc<dyn EventProducer>,
    config: PollerConfig,
}

impl OutboxPoller {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        producer: Arc<dyn EventProducer>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            producer,
            config,
        }
    }

    /// Tick on the configured interval until `shutdown` fires or its sender
    /// is dropped. Shutdown is only observed between ticks.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            topic = %self.config.topic,
            interval_ms = self.config.interval.as_millis() as u64,
            batch = self.config.batch,
            "outbox poller started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("outbox poller shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let report = self.tick().await;
            if report.fetched > 0 {
                tracing::info!(
                    fetched = report.fetched,
                    published = report.published,
                    failed = report.failed,
                    "outbox tick"
                );
            }
        }
    }

    pub fn spawn(self) -> PollerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        PollerHandle { shutdown, task }
    }

    /// Drain one batch. Errors are logged, never returned: whatever is not
    /// marked published stays pending for a later tick.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let events = match self.store.fetch_pending(self.config.batch).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch pending outbox events");
                return report;
            }
        };
        report.fetched = events.len();

        for event in events {
            let published = self
                .producer
                .publish(
                    &self.config.topic,
                    &event.event_type,
                    event.event_id,
                    event.timestamp,
                    &event.payload,
                )
                .await;

            if let Err(e) = published {
                report.failed += 1;
                tracing::error!(event_id = %event.event_id, error = %e, "failed to publish event");
                if let Err(e) = self.store.release_claim(event.event_id).await {
                    tracing::warn!(event_id = %event.event_id, error = %e, "failed to release outbox claim");
                }
                continue;
            }

            match self.store.mark_published(event.event_id).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    // Already on the broker; it will be sent again and deduped downstream.
                    report.failed += 1;
                    tracing::error!(event_id = %event.event_id, error = %e, "failed to mark event published");
                }
            }
        }

        report
    }
}

/// Running poller task.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal shutdown and wait for the in-flight tick to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "outbox poller task failed");
        }
    }
}
