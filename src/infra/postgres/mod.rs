pub mod order_repo;
pub mod outbox_repo;
pub mod payment_repo;
pub mod unit_of_work;

pub type PgTx = sqlx::Transaction<'static, sqlx::Postgres>;
