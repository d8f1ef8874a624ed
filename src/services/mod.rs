pub mod consumers;
pub mod outbox_poller;
pub mod payment_processor;
