use chrono::Utc;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Payment, PaymentStatus};

const PAYMENT_COLUMNS: &str = "id, owner_id, order_id, payment_id, signature, amount, currency, \
     method, status, refund_id, refund_amount, refund_status, refund_created_at, \
     created_at, updated_at";

/// SQL for the payments mirror. Status transitions are conditional updates:
/// a transition only commits when the current status is in the caller's
/// expected source set, so concurrent verify/webhook deliveries for the
/// same order serialize at the row level. Methods take any executor so the
/// store can pair a transition with its audit append in one transaction.
pub struct PaymentRepository;

impl PaymentRepository {
    pub async fn create(
        executor: impl PgExecutor<'_>,
        owner_id: Option<&str>,
        order_id: &str,
        amount: i64,
        currency: &str,
    ) -> AppResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (id, owner_id, order_id, amount, currency, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_id)
            .bind(order_id)
            .bind(amount)
            .bind(currency)
            .bind(PaymentStatus::Created)
            .bind(Utc::now())
            .fetch_one(executor)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_order_id(
        executor: impl PgExecutor<'_>,
        order_id: &str,
    ) -> AppResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1");

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_payment_id(
        executor: impl PgExecutor<'_>,
        payment_id: &str,
    ) -> AppResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1");

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    pub async fn list_by_owner(
        executor: impl PgExecutor<'_>,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );

        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await?;

        Ok(payments)
    }

    /// Compare-and-swap to `paid`. Returns `None` when the current status is
    /// not in `expected`, in which case the caller re-reads and converges.
    pub async fn mark_paid(
        executor: impl PgExecutor<'_>,
        order_id: &str,
        payment_id: &str,
        signature: Option<&str>,
        method: Option<&str>,
        expected: &[PaymentStatus],
    ) -> AppResult<Option<Payment>> {
        let sql = format!(
            "UPDATE payments \
             SET status = $2, payment_id = $3, \
                 signature = COALESCE($4, signature), \
                 method = COALESCE($5, method), \
                 updated_at = $6 \
             WHERE order_id = $1 AND status = ANY($7) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .bind(PaymentStatus::Paid)
            .bind(payment_id)
            .bind(signature)
            .bind(method)
            .bind(Utc::now())
            .bind(expected.to_vec())
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    /// Compare-and-swap to `failed`; never touches records already `paid`
    /// or in a terminal state.
    pub async fn mark_failed(
        executor: impl PgExecutor<'_>,
        order_id: &str,
        payment_id: Option<&str>,
        expected: &[PaymentStatus],
    ) -> AppResult<Option<Payment>> {
        let sql = format!(
            "UPDATE payments \
             SET status = $2, payment_id = COALESCE($3, payment_id), updated_at = $4 \
             WHERE order_id = $1 AND status = ANY($5) \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(order_id)
            .bind(PaymentStatus::Failed)
            .bind(payment_id)
            .bind(Utc::now())
            .bind(expected.to_vec())
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    /// Record a gateway-confirmed refund, moving `paid -> refunded` in one
    /// conditional statement. `None` means the record was not `paid`.
    pub async fn record_refund(
        executor: impl PgExecutor<'_>,
        id: Uuid,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
    ) -> AppResult<Option<Payment>> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE payments \
             SET status = $2, refund_id = $3, refund_amount = $4, \
                 refund_status = $5, refund_created_at = $6, updated_at = $6 \
             WHERE id = $1 AND status = $7 \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .bind(PaymentStatus::Refunded)
            .bind(refund_id)
            .bind(refund_amount)
            .bind(refund_status)
            .bind(now)
            .bind(PaymentStatus::Paid)
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    /// Merge refund details delivered by webhook. Leaves `status` alone:
    /// the refund endpoint owns the `paid -> refunded` transition.
    pub async fn merge_webhook_refund(
        executor: impl PgExecutor<'_>,
        payment_id: &str,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
    ) -> AppResult<Option<Payment>> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE payments \
             SET refund_id = $2, refund_amount = $3, refund_status = $4, \
                 refund_created_at = COALESCE(refund_created_at, $5), updated_at = $5 \
             WHERE payment_id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        );

        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(refund_id)
            .bind(refund_amount)
            .bind(refund_status)
            .bind(now)
            .fetch_optional(executor)
            .await?;

        Ok(payment)
    }

    /// Append one audit entry. Inserts only; log rows are never updated
    /// or deleted.
    pub async fn append_log(
        executor: impl PgExecutor<'_>,
        payment_ref: Uuid,
        status: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO payment_logs (id, payment_ref, status, message, meta, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(payment_ref)
        .bind(status)
        .bind(message)
        .bind(meta)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }
}
