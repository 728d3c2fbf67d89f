use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::db::store::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    to_minor_units, Payment, PaymentStatus, WebhookEnvelope, WebhookKind, VERIFY_FAILED_SOURCES,
    VERIFY_PAID_SOURCES, WEBHOOK_FAILED_SOURCES, WEBHOOK_PAID_SOURCES,
};
use crate::services::notify::{Notification, NotificationDispatcher};
use crate::services::razorpay::{
    signature, CreateOrderRequest, RazorpayClient, RazorpayOrder, RazorpayRefund, RefundRequest,
};

/// Reconciliation engine: owns every transition on a payment record and
/// applies them from the three entry points (order creation, client verify,
/// webhook) plus refunds. All mutations go through the store's conditional
/// transition-plus-log operations, so concurrent deliveries for the same
/// order converge instead of clobbering each other and no transition is
/// ever durable without its audit entry.
pub struct PaymentProcessor {
    razorpay: RazorpayClient,
    key_secret: String,
    webhook_secret: String,
    notifier: Arc<NotificationDispatcher>,
}

pub struct OrderCreation {
    pub payment: Payment,
    pub order: RazorpayOrder,
}

#[derive(Debug)]
pub struct RefundOutcome {
    pub payment: Payment,
    pub refund: RazorpayRefund,
}

impl PaymentProcessor {
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            razorpay: RazorpayClient::new(&config.razorpay)?,
            key_secret: config.razorpay.key_secret.clone(),
            webhook_secret: config.razorpay.webhook_secret.clone(),
            notifier: Arc::new(NotificationDispatcher::new(&config.notifications)?),
        })
    }

    /// Assemble an engine from pre-built collaborators. Tests use this to
    /// point the gateway client at a mock server.
    pub fn with_parts(
        razorpay: RazorpayClient,
        key_secret: String,
        webhook_secret: String,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            razorpay,
            key_secret,
            webhook_secret,
            notifier,
        }
    }

    /// Create a gateway order and the local mirror record together. The
    /// remote call comes first; if the local insert then fails the request
    /// errors and the remote order stays dangling until the gateway webhook
    /// reports on it.
    pub async fn create_order(
        &self,
        store: &dyn PaymentStore,
        owner_id: Option<&str>,
        amount_major: f64,
        currency: &str,
    ) -> AppResult<OrderCreation> {
        let amount = to_minor_units(amount_major)
            .ok_or_else(|| AppError::Validation("Invalid amount".to_string()))?;

        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt: Some(format!("rcpt_{}", Uuid::new_v4().simple())),
            payment_capture: 1,
        };

        let order = self.razorpay.create_order(&request).await?;

        let payment = store
            .create_with_log(
                owner_id,
                &order.id,
                amount,
                currency,
                "Order created",
                Some(serde_json::to_value(&order)?),
            )
            .await?;

        tracing::info!(
            order_id = %order.id,
            amount,
            currency,
            "Gateway order created"
        );

        Ok(OrderCreation { payment, order })
    }

    /// Client-reported completion. Signature check first; nothing below it
    /// runs on a mismatch except marking the record failed. Idempotent: a
    /// repeat call on an already-paid record is a no-op success with no
    /// second log entry and no second notification.
    pub async fn verify_payment(
        &self,
        store: &dyn PaymentStore,
        order_id: &str,
        payment_id: &str,
        signature_value: &str,
        method: Option<&str>,
        raw_request: serde_json::Value,
    ) -> AppResult<Payment> {
        let valid = signature::verify_payment_signature(
            order_id,
            payment_id,
            signature_value,
            &self.key_secret,
        );

        if !valid {
            // Nothing else in the request body is trusted past this point.
            store
                .mark_failed_with_log(
                    order_id,
                    None,
                    VERIFY_FAILED_SOURCES,
                    "Signature verification failed",
                    Some(raw_request),
                )
                .await?;
            return Err(AppError::InvalidSignature("Invalid signature".to_string()));
        }

        let updated = store
            .mark_paid_with_log(
                order_id,
                payment_id,
                Some(signature_value),
                method,
                VERIFY_PAID_SOURCES,
                "Payment verified and marked as paid",
                Some(raw_request),
            )
            .await?;

        match updated {
            Some(payment) => {
                if let Some(owner) = payment.owner_id.as_deref() {
                    self.notifier.dispatch(Notification::payment_confirmed(
                        owner,
                        payment_id,
                        payment.amount,
                        &payment.currency,
                    ));
                }

                tracing::info!(order_id, payment_id, "Payment verified");
                Ok(payment)
            }
            None => {
                // CAS lost: the record is missing or already moved on.
                let existing = store
                    .find_by_order_id(order_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound("Payment order not found".to_string())
                    })?;

                if existing.status == PaymentStatus::Paid {
                    tracing::debug!(order_id, "Re-verification of paid record, no-op");
                    Ok(existing)
                } else {
                    Err(AppError::InvalidState(format!(
                        "Payment cannot be verified in state: {}",
                        existing.status.as_str()
                    )))
                }
            }
        }
    }

    /// Webhook reconciliation over the raw request bytes. Once the
    /// signature passes, every outcome acks with success: the gateway only
    /// retries failures, and a missing local record cannot be healed by
    /// retrying a webhook.
    pub async fn handle_webhook(
        &self,
        store: &dyn PaymentStore,
        raw_body: &[u8],
        signature_header: &str,
    ) -> AppResult<()> {
        if !signature::verify_webhook_signature(raw_body, signature_header, &self.webhook_secret)
        {
            tracing::warn!("Webhook signature mismatch");
            return Err(AppError::WebhookVerification(
                "Invalid webhook signature".to_string(),
            ));
        }

        let raw: serde_json::Value = match serde_json::from_slice(raw_body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Signed webhook body is not valid JSON, ignoring");
                return Ok(());
            }
        };

        let envelope: WebhookEnvelope = match serde_json::from_value(raw.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Unrecognized webhook envelope, ignoring");
                return Ok(());
            }
        };

        match WebhookKind::classify(&envelope.event) {
            WebhookKind::PaymentCaptured => {
                self.apply_payment_event(store, &envelope, raw, PaymentStatus::Paid)
                    .await
            }
            WebhookKind::PaymentFailed => {
                self.apply_payment_event(store, &envelope, raw, PaymentStatus::Failed)
                    .await
            }
            WebhookKind::RefundProcessed => self.apply_refund_event(store, &envelope, raw).await,
            WebhookKind::Unknown => {
                tracing::info!(event = %envelope.event, "Unhandled webhook event, acked");
                Ok(())
            }
        }
    }

    async fn apply_payment_event(
        &self,
        store: &dyn PaymentStore,
        envelope: &WebhookEnvelope,
        raw: serde_json::Value,
        target: PaymentStatus,
    ) -> AppResult<()> {
        let Some(entity) = envelope.payload.payment.as_ref().map(|p| &p.entity) else {
            tracing::warn!(event = %envelope.event, "Payment event without payment entity");
            return Ok(());
        };

        let Some(order_id) = entity.order_id.as_deref() else {
            tracing::warn!(event = %envelope.event, "Payment event without order_id");
            return Ok(());
        };

        let Some(existing) = store.find_by_order_id(order_id).await? else {
            tracing::info!(
                event = %envelope.event,
                order_id,
                "Webhook for unknown order, acked without state change"
            );
            return Ok(());
        };

        let message = format!("Webhook: {}", envelope.event);

        let updated = match target {
            PaymentStatus::Paid => {
                // The webhook secret is an independent trust path, so it may
                // move a locally failed record back to paid.
                store
                    .mark_paid_with_log(
                        order_id,
                        &entity.id,
                        None,
                        entity.method.as_deref(),
                        WEBHOOK_PAID_SOURCES,
                        &message,
                        Some(raw.clone()),
                    )
                    .await?
            }
            _ => {
                store
                    .mark_failed_with_log(
                        order_id,
                        Some(&entity.id),
                        WEBHOOK_FAILED_SOURCES,
                        &message,
                        Some(raw.clone()),
                    )
                    .await?
            }
        };

        if updated.is_none() {
            tracing::debug!(
                event = %envelope.event,
                order_id,
                status = existing.status.as_str(),
                "Webhook transition was a no-op"
            );
            // The delivery itself still gets exactly one audit entry.
            store
                .append_log(existing.id, target.as_str(), &message, Some(raw))
                .await?;
        }

        Ok(())
    }

    async fn apply_refund_event(
        &self,
        store: &dyn PaymentStore,
        envelope: &WebhookEnvelope,
        raw: serde_json::Value,
    ) -> AppResult<()> {
        let Some(entity) = envelope.payload.refund.as_ref().map(|r| &r.entity) else {
            tracing::warn!(event = %envelope.event, "Refund event without refund entity");
            return Ok(());
        };

        let updated = store
            .merge_webhook_refund_with_log(
                &entity.payment_id,
                &entity.id,
                entity.amount,
                &entity.status,
                &format!("Webhook refund: {}", envelope.event),
                Some(raw),
            )
            .await?;

        if updated.is_none() {
            tracing::info!(
                event = %envelope.event,
                payment_id = %entity.payment_id,
                "Refund webhook for unknown payment, acked"
            );
        }

        Ok(())
    }

    /// Issue a refund for a `paid` record. The gateway call happens before
    /// any local mutation; a gateway failure leaves the record untouched.
    pub async fn refund(
        &self,
        store: &dyn PaymentStore,
        gateway_payment_id: &str,
        amount_major: Option<f64>,
    ) -> AppResult<RefundOutcome> {
        let payment = store
            .find_by_payment_id(gateway_payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if !payment.status.can_transition(PaymentStatus::Refunded) {
            return Err(AppError::InvalidState(format!(
                "Cannot refund payment in state: {}",
                payment.status.as_str()
            )));
        }

        let amount = match amount_major {
            Some(major) => {
                let minor = to_minor_units(major)
                    .ok_or_else(|| AppError::Validation("Invalid refund amount".to_string()))?;
                if minor > payment.amount {
                    return Err(AppError::Validation(
                        "Refund amount cannot exceed payment amount".to_string(),
                    ));
                }
                Some(minor)
            }
            None => None,
        };

        let request = RefundRequest {
            amount,
            receipt: Some(format!("refund_{}", payment.id)),
        };

        let refund = self
            .razorpay
            .refund_payment(gateway_payment_id, &request)
            .await?;

        let updated = store
            .record_refund_with_log(
                payment.id,
                &refund.id,
                refund.amount,
                &refund.status,
                "Refund processed",
                Some(serde_json::to_value(&refund)?),
            )
            .await?;

        match updated {
            Some(updated) => {
                tracing::info!(
                    payment_id = gateway_payment_id,
                    refund_id = %refund.id,
                    amount = refund.amount,
                    "Refund processed"
                );

                Ok(RefundOutcome {
                    payment: updated,
                    refund,
                })
            }
            None => {
                // The gateway refund went through but the record left `paid`
                // concurrently. Keep the forensic trail and surface the
                // conflict.
                tracing::error!(
                    payment_id = gateway_payment_id,
                    refund_id = %refund.id,
                    "Refund issued but record was no longer paid"
                );
                store
                    .append_log(
                        payment.id,
                        "refund",
                        "Refund issued at gateway but record had left the paid state",
                        Some(serde_json::to_value(&refund)?),
                    )
                    .await?;
                Err(AppError::InvalidState(
                    "Payment left the paid state during refund".to_string(),
                ))
            }
        }
    }
}
