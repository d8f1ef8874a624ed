use {
    super::PgTx,
    crate::domain::error::PipelineError,
    crate::domain::ports::{BoxFuture, UnitOfWork},
    sqlx::PgPool,
};

#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UnitOfWork for PgUnitOfWork {
    type Tx = PgTx;

    fn within_transaction<'a, T, F>(&'a self, f: F) -> BoxFuture<'a, Result<T, PipelineError>>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t mut PgTx) -> BoxFuture<'t, Result<T, PipelineError>> + Send + 'a,
    {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query("SET LOCAL lock_timeout = '5s'")
                .execute(&mut *tx)
                .await?;

            let value = match f(&mut tx).await {
                Ok(value) => value,
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "rollback failed, connection discarded");
                    }
                    return Err(e);
                }
            };

            // Detached so that dropping the caller cannot interrupt a commit in flight.
            tokio::spawn(tx.commit())
                .await
                .map_err(|e| PipelineError::Infrastructure(format!("commit task failed: {e}")))??;

            Ok(value)
        })
    }
}
