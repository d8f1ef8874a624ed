use {
    super::PgTx,
    crate::domain::error::PipelineError,
    crate::domain::payment::Payment,
    crate::domain::ports::{BoxFuture, PaymentLedger},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PgPaymentRepo;

impl PgPaymentRepo {
    pub fn new() -> Self {
        Self
    }
}

pub async fn insert_payment(tx: &mut PgTx, payment: &Payment) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO payments (order_reference, user_id, amount, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(payment.order_reference().as_uuid())
    .bind(payment.user_id().get())
    .bind(payment.amount().value())
    .bind(payment.created_at())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

impl PaymentLedger<PgTx> for PgPaymentRepo {
    fn create<'a>(
        &'a self,
        tx: &'a mut PgTx,
        payment: &'a Payment,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(insert_payment(tx, payment))
    }
}
