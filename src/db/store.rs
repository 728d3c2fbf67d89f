use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::repositories::PaymentRepository;
use crate::error::AppResult;
use crate::models::{Payment, PaymentStatus};

/// Durable payment-record store consumed by the reconciliation engine.
///
/// Every status transition and its audit-log append form one atomic
/// operation: a transition is never durable without its log entry. The
/// standalone `append_log` exists for audit-only writes (webhook
/// deliveries that change no state) where there is no transition to pair
/// with.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_with_log(
        &self,
        owner_id: Option<&str>,
        order_id: &str,
        amount: i64,
        currency: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Payment>;

    async fn find_by_order_id(&self, order_id: &str) -> AppResult<Option<Payment>>;

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Payment>>;

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payment>>;

    async fn mark_paid_with_log(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: Option<&str>,
        method: Option<&str>,
        expected: &[PaymentStatus],
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>>;

    async fn mark_failed_with_log(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        expected: &[PaymentStatus],
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>>;

    async fn record_refund_with_log(
        &self,
        id: Uuid,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>>;

    async fn merge_webhook_refund_with_log(
        &self,
        payment_id: &str,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>>;

    async fn append_log(
        &self,
        payment_ref: Uuid,
        status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<()>;
}

/// Postgres-backed store. Pairs each conditional transition with its log
/// append inside a transaction, so a crash between the two statements
/// rolls both back and a client retry re-runs the full transition.
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create_with_log(
        &self,
        owner_id: Option<&str>,
        order_id: &str,
        amount: i64,
        currency: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let payment =
            PaymentRepository::create(&mut *tx, owner_id, order_id, amount, currency).await?;
        PaymentRepository::append_log(
            &mut *tx,
            payment.id,
            PaymentStatus::Created.as_str(),
            message,
            meta,
        )
        .await?;

        tx.commit().await?;
        Ok(payment)
    }

    async fn find_by_order_id(&self, order_id: &str) -> AppResult<Option<Payment>> {
        PaymentRepository::find_by_order_id(&self.pool, order_id).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Payment>> {
        PaymentRepository::find_by_payment_id(&self.pool, payment_id).await
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payment>> {
        PaymentRepository::list_by_owner(&self.pool, owner_id, limit, offset).await
    }

    async fn mark_paid_with_log(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: Option<&str>,
        method: Option<&str>,
        expected: &[PaymentStatus],
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let updated = PaymentRepository::mark_paid(
            &mut *tx,
            order_id,
            payment_id,
            signature,
            method,
            expected,
        )
        .await?;

        if let Some(ref payment) = updated {
            PaymentRepository::append_log(
                &mut *tx,
                payment.id,
                PaymentStatus::Paid.as_str(),
                message,
                meta,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn mark_failed_with_log(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        expected: &[PaymentStatus],
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let updated =
            PaymentRepository::mark_failed(&mut *tx, order_id, payment_id, expected).await?;

        if let Some(ref payment) = updated {
            PaymentRepository::append_log(
                &mut *tx,
                payment.id,
                PaymentStatus::Failed.as_str(),
                message,
                meta,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn record_refund_with_log(
        &self,
        id: Uuid,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let updated = PaymentRepository::record_refund(
            &mut *tx,
            id,
            refund_id,
            refund_amount,
            refund_status,
        )
        .await?;

        if let Some(ref payment) = updated {
            PaymentRepository::append_log(
                &mut *tx,
                payment.id,
                PaymentStatus::Refunded.as_str(),
                message,
                meta,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn merge_webhook_refund_with_log(
        &self,
        payment_id: &str,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let updated = PaymentRepository::merge_webhook_refund(
            &mut *tx,
            payment_id,
            refund_id,
            refund_amount,
            refund_status,
        )
        .await?;

        if let Some(ref payment) = updated {
            PaymentRepository::append_log(&mut *tx, payment.id, "refund", message, meta).await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn append_log(
        &self,
        payment_ref: Uuid,
        status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<()> {
        PaymentRepository::append_log(&self.pool, payment_ref, status, message, meta).await
    }
}
