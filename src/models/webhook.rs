use serde::{Deserialize, Serialize};

/// Razorpay webhook envelope. Only the fields the reconciliation engine
/// reads are modeled; everything else stays in the raw payload that gets
/// written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookEntity<WebhookPaymentData>>,
    #[serde(default)]
    pub refund: Option<WebhookEntity<WebhookRefundData>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntity<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPaymentData {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRefundData {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: String,
}

/// Event kinds the engine acts on. Anything else is acked untouched so
/// new gateway event types never cause retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    PaymentCaptured,
    PaymentFailed,
    RefundProcessed,
    Unknown,
}

impl WebhookKind {
    pub fn classify(event: &str) -> Self {
        match event {
            "payment.captured" => WebhookKind::PaymentCaptured,
            "payment.failed" => WebhookKind::PaymentFailed,
            "refund.processed" | "refund.created" => WebhookKind::RefundProcessed,
            _ => WebhookKind::Unknown,
        }
    }
}
