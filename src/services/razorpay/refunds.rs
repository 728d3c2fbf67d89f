use serde::{Deserialize, Serialize};

use super::RazorpayClient;
use crate::error::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    /// Partial refund amount in minor units; omitted for a full refund.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub payment_id: String,
    pub status: String,
    pub created_at: i64,
}

impl RazorpayClient {
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        request: &RefundRequest,
    ) -> AppResult<RazorpayRefund> {
        self.post(&format!("/payments/{}/refund", payment_id), request)
            .await
    }
}
