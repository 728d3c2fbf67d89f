use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::PaymentResponse;
use crate::services::razorpay::{RazorpayOrder, RazorpayRefund};
use crate::AppState;

const DEFAULT_CURRENCY: &str = "INR";
const MAX_HISTORY_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderBody {
    /// Amount in major units (e.g. rupees); converted to paise internally.
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    pub amount: f64,
    #[serde(default)]
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub ok: bool,
    pub order: RazorpayOrder,
    /// Public key id for the checkout UI. Never a secret.
    pub key: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateOrderBody>,
) -> AppResult<Json<CreateOrderResponse>> {
    body.validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    let currency = body
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();

    let created = state
        .processor
        .create_order(state.store.as_ref(), Some(&user.user_id), body.amount, &currency)
        .await?;

    Ok(Json(CreateOrderResponse {
        ok: true,
        order: created.order,
        key: state.config.razorpay.key_id.clone(),
    }))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyPaymentBody {
    #[serde(default)]
    #[validate(length(min = 1, message = "razorpay_order_id is required"))]
    pub razorpay_order_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "razorpay_payment_id is required"))]
    pub razorpay_payment_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "razorpay_signature is required"))]
    pub razorpay_signature: String,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub ok: bool,
    pub order_id: String,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Json(body): Json<VerifyPaymentBody>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    body.validate()
        .map_err(|e| AppError::Validation(format!("Missing required fields: {}", e)))?;

    let raw_request = serde_json::to_value(&body)?;

    let payment = state
        .processor
        .verify_payment(
            state.store.as_ref(),
            &body.razorpay_order_id,
            &body.razorpay_payment_id,
            &body.razorpay_signature,
            body.method.as_deref(),
            raw_request,
        )
        .await?;

    Ok(Json(VerifyPaymentResponse {
        ok: true,
        order_id: payment.order_id,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundBody {
    #[serde(default)]
    #[validate(length(min = 1, message = "payment_id is required"))]
    pub payment_id: String,
    /// Partial refund amount in major units; omitted for a full refund.
    #[serde(default)]
    #[validate(range(min = 0.01, message = "Refund amount must be positive"))]
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub ok: bool,
    pub refund: RazorpayRefund,
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Json(body): Json<RefundBody>,
) -> AppResult<Json<RefundResponse>> {
    body.validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    let outcome = state
        .processor
        .refund(state.store.as_ref(), &body.payment_id, body.amount)
        .await?;

    Ok(Json(RefundResponse {
        ok: true,
        refund: outcome.refund,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub ok: bool,
    pub payments: Vec<PaymentResponse>,
}

/// Clamp untrusted pagination params to a (limit, offset) pair. Saturates
/// on `page * limit` so an absurd page number cannot overflow i64.
fn history_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(50).clamp(1, MAX_HISTORY_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);
    (limit, offset)
}

pub async fn payment_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<HistoryResponse>> {
    let (limit, offset) = history_window(params.page, params.limit);

    let payments = state
        .store
        .list_by_owner(&user.user_id, limit, offset)
        .await?;

    Ok(Json(HistoryResponse {
        ok: true,
        payments: payments.into_iter().map(PaymentResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_window_defaults() {
        assert_eq!(history_window(None, None), (50, 0));
        assert_eq!(history_window(Some(3), Some(20)), (20, 40));
    }

    #[test]
    fn history_window_clamps_hostile_input() {
        assert_eq!(history_window(Some(0), Some(0)), (1, 0));
        assert_eq!(history_window(Some(-5), Some(-5)), (1, 0));
        assert_eq!(history_window(None, Some(10_000)), (MAX_HISTORY_PAGE_SIZE, 0));
    }

    #[test]
    fn history_window_saturates_instead_of_overflowing() {
        let (limit, offset) = history_window(Some(i64::MAX), Some(MAX_HISTORY_PAGE_SIZE));
        assert_eq!(limit, MAX_HISTORY_PAGE_SIZE);
        assert_eq!(offset, i64::MAX);

        let (_, offset) = history_window(Some(i64::MAX), Some(2));
        assert_eq!(offset, i64::MAX);
    }
}
