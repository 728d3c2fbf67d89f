use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a payment record.
///
/// `created` moves to any of the attempt outcomes; only `paid` can be
/// refunded. `refunded` and `cancelled` are terminal. `failed` is terminal
/// on the client verify path, but the webhook path may still move it to
/// `paid` because the two paths are signed with independent secrets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
    Refunded,
    Cancelled,
    Pending,
}

// sqlx's Type derive maps the enum to the pg type but does not cover
// arrays, which the conditional updates bind for their expected-status
// sets. Postgres names the array type with a leading underscore.
impl PgHasArrayType for PaymentStatus {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_payment_status")
    }
}

impl PaymentStatus {
    /// Transition table for the client-facing paths (create/verify/refund).
    pub fn can_transition(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match self {
            Created => matches!(next, Paid | Failed | Cancelled | Pending),
            Pending => matches!(next, Paid | Failed | Cancelled),
            Paid => matches!(next, Refunded),
            Failed | Refunded | Cancelled => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        use PaymentStatus::*;
        match self {
            Created => "created",
            Paid => "paid",
            Failed => "failed",
            Refunded => "refunded",
            Cancelled => "cancelled",
            Pending => "pending",
        }
    }
}

/// Source states from which the client verify path may mark a record `paid`.
/// `failed` is deliberately excluded: a bad signature never resurrects here.
pub const VERIFY_PAID_SOURCES: &[PaymentStatus] =
    &[PaymentStatus::Created, PaymentStatus::Pending];

/// Source states from which the verify path may mark a record `failed`.
pub const VERIFY_FAILED_SOURCES: &[PaymentStatus] =
    &[PaymentStatus::Created, PaymentStatus::Pending];

/// Source states for webhook-driven `paid`. The webhook secret is an
/// independent trust path, so it may also move a locally `failed` record
/// to `paid` (accepted inconsistency window).
pub const WEBHOOK_PAID_SOURCES: &[PaymentStatus] = &[
    PaymentStatus::Created,
    PaymentStatus::Pending,
    PaymentStatus::Failed,
];

/// Source states for webhook-driven `failed`.
pub const WEBHOOK_FAILED_SOURCES: &[PaymentStatus] =
    &[PaymentStatus::Created, PaymentStatus::Pending];

/// One purchase attempt mirrored from the gateway. `order_id`, `amount`
/// and `currency` are fixed at creation; everything else is set by the
/// verify, webhook and refund paths.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub owner_id: Option<String>,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub refund_id: Option<String>,
    pub refund_amount: Option<i64>,
    pub refund_status: Option<String>,
    pub refund_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn refund(&self) -> Option<Refund> {
        self.refund_id.as_ref().map(|id| Refund {
            refund_id: id.clone(),
            amount: self.refund_amount.unwrap_or_default(),
            status: self.refund_status.clone().unwrap_or_default(),
            created_at: self.refund_created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub refund_id: String,
    pub amount: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Append-only audit entry; one per transition or webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentLog {
    pub id: Uuid,
    pub payment_ref: Uuid,
    pub status: String,
    pub message: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        let refund = payment.refund();
        Self {
            id: payment.id,
            order_id: payment.order_id,
            payment_id: payment.payment_id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            method: payment.method,
            refund,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Convert a major-unit amount (e.g. rupees) to the smallest currency unit
/// (paise). Rejects non-positive and non-finite input.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let minor = (amount * 100.0).round();
    if minor < 1.0 || minor > i64::MAX as f64 {
        return None;
    }
    Some(minor as i64)
}
