use serde::{Deserialize, Serialize};

use super::RazorpayClient;
use crate::error::AppResult;

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    pub payment_capture: u8,
}

/// Order payload as returned by the gateway. Serialized back to the client
/// verbatim (the checkout UI needs it) and into the first audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    pub created_at: i64,
}

impl RazorpayClient {
    pub async fn create_order(&self, request: &CreateOrderRequest) -> AppResult<RazorpayOrder> {
        self.post("/orders", request).await
    }
}
