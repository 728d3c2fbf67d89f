//! Reconciliation engine tests over an in-memory store. The store mirrors
//! the conditional-transition semantics of the Postgres one, so these tests
//! exercise the engine's branching (idempotent re-verify, webhook
//! no-ops, refund preconditions) without a database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_service::config::{NotificationConfig, RazorpayConfig};
use payment_service::db::PaymentStore;
use payment_service::error::{AppError, AppResult};
use payment_service::models::{Payment, PaymentStatus};
use payment_service::services::notify::NotificationDispatcher;
use payment_service::services::razorpay::{signature, RazorpayClient};
use payment_service::services::PaymentProcessor;

const KEY_SECRET: &str = "test_key_secret";
const WEBHOOK_SECRET: &str = "test_webhook_secret";

struct LogEntry {
    payment_ref: Uuid,
    status: String,
}

#[derive(Default)]
struct MemoryStore {
    payments: Mutex<Vec<Payment>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl MemoryStore {
    fn seed(&self, status: PaymentStatus, order_id: &str, payment_id: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.payments.lock().unwrap().push(Payment {
            id,
            owner_id: Some("user_1".to_string()),
            order_id: order_id.to_string(),
            payment_id: payment_id.map(str::to_string),
            signature: None,
            amount: 50000,
            currency: "INR".to_string(),
            method: None,
            status,
            refund_id: None,
            refund_amount: None,
            refund_status: None,
            refund_created_at: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn status_of(&self, order_id: &str) -> PaymentStatus {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.order_id == order_id)
            .map(|p| p.status)
            .unwrap()
    }

    fn logs_with_status(&self, status: &str) -> usize {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == status)
            .count()
    }

    fn log_count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    fn push_log(&self, payment_ref: Uuid, status: &str) {
        self.logs.lock().unwrap().push(LogEntry {
            payment_ref,
            status: status.to_string(),
        });
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_with_log(
        &self,
        owner_id: Option<&str>,
        order_id: &str,
        amount: i64,
        currency: &str,
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<Payment> {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            owner_id: owner_id.map(str::to_string),
            order_id: order_id.to_string(),
            payment_id: None,
            signature: None,
            amount,
            currency: currency.to_string(),
            method: None,
            status: PaymentStatus::Created,
            refund_id: None,
            refund_amount: None,
            refund_status: None,
            refund_created_at: None,
            created_at: now,
            updated_at: now,
        };
        self.payments.lock().unwrap().push(payment.clone());
        self.push_log(payment.id, PaymentStatus::Created.as_str());
        Ok(payment)
    }

    async fn find_by_order_id(&self, order_id: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Payment>> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.owner_id.as_deref() == Some(owner_id))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_paid_with_log(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: Option<&str>,
        method: Option<&str>,
        expected: &[PaymentStatus],
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let updated = {
            let mut payments = self.payments.lock().unwrap();
            payments
                .iter_mut()
                .find(|p| p.order_id == order_id && expected.contains(&p.status))
                .map(|p| {
                    p.status = PaymentStatus::Paid;
                    p.payment_id = Some(payment_id.to_string());
                    if let Some(sig) = signature {
                        p.signature = Some(sig.to_string());
                    }
                    if let Some(m) = method {
                        p.method = Some(m.to_string());
                    }
                    p.updated_at = Utc::now();
                    p.clone()
                })
        };
        if let Some(ref payment) = updated {
            self.push_log(payment.id, PaymentStatus::Paid.as_str());
        }
        Ok(updated)
    }

    async fn mark_failed_with_log(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        expected: &[PaymentStatus],
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let updated = {
            let mut payments = self.payments.lock().unwrap();
            payments
                .iter_mut()
                .find(|p| p.order_id == order_id && expected.contains(&p.status))
                .map(|p| {
                    p.status = PaymentStatus::Failed;
                    if let Some(pid) = payment_id {
                        p.payment_id = Some(pid.to_string());
                    }
                    p.updated_at = Utc::now();
                    p.clone()
                })
        };
        if let Some(ref payment) = updated {
            self.push_log(payment.id, PaymentStatus::Failed.as_str());
        }
        Ok(updated)
    }

    async fn record_refund_with_log(
        &self,
        id: Uuid,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let updated = {
            let mut payments = self.payments.lock().unwrap();
            payments
                .iter_mut()
                .find(|p| p.id == id && p.status == PaymentStatus::Paid)
                .map(|p| {
                    p.status = PaymentStatus::Refunded;
                    p.refund_id = Some(refund_id.to_string());
                    p.refund_amount = Some(refund_amount);
                    p.refund_status = Some(refund_status.to_string());
                    p.refund_created_at = Some(Utc::now());
                    p.updated_at = Utc::now();
                    p.clone()
                })
        };
        if let Some(ref payment) = updated {
            self.push_log(payment.id, PaymentStatus::Refunded.as_str());
        }
        Ok(updated)
    }

    async fn merge_webhook_refund_with_log(
        &self,
        payment_id: &str,
        refund_id: &str,
        refund_amount: i64,
        refund_status: &str,
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<Option<Payment>> {
        let updated = {
            let mut payments = self.payments.lock().unwrap();
            payments
                .iter_mut()
                .find(|p| p.payment_id.as_deref() == Some(payment_id))
                .map(|p| {
                    p.refund_id = Some(refund_id.to_string());
                    p.refund_amount = Some(refund_amount);
                    p.refund_status = Some(refund_status.to_string());
                    p.updated_at = Utc::now();
                    p.clone()
                })
        };
        if let Some(ref payment) = updated {
            self.push_log(payment.id, "refund");
        }
        Ok(updated)
    }

    async fn append_log(
        &self,
        payment_ref: Uuid,
        status: &str,
        _message: &str,
        _meta: Option<serde_json::Value>,
    ) -> AppResult<()> {
        self.push_log(payment_ref, status);
        Ok(())
    }
}

fn gateway_config() -> RazorpayConfig {
    RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: KEY_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
    }
}

fn engine(base_url: &str) -> PaymentProcessor {
    let config = gateway_config();
    let razorpay =
        RazorpayClient::with_base_url(&config, base_url).expect("client construction");
    let notifier = NotificationDispatcher::new(&NotificationConfig {
        endpoint: None,
        timeout_secs: 5,
    })
    .expect("dispatcher construction");

    PaymentProcessor::with_parts(
        razorpay,
        KEY_SECRET.to_string(),
        WEBHOOK_SECRET.to_string(),
        Arc::new(notifier),
    )
}

// The gateway is never reached on these paths.
fn offline_engine() -> PaymentProcessor {
    engine("http://127.0.0.1:9")
}

fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    signature::sign_hex(format!("{}|{}", order_id, payment_id).as_bytes(), KEY_SECRET)
}

fn signed_webhook(event: &str, payload: serde_json::Value) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&json!({ "event": event, "payload": payload }))
        .expect("webhook body");
    let sig = signature::sign_hex(&body, WEBHOOK_SECRET);
    (body, sig)
}

#[tokio::test]
async fn repeated_verify_is_idempotent() {
    let store = MemoryStore::default();
    store.seed(PaymentStatus::Created, "order_idem", None);
    let processor = offline_engine();

    let sig = checkout_signature("order_idem", "pay_1");
    let first = processor
        .verify_payment(&store, "order_idem", "pay_1", &sig, None, json!({}))
        .await
        .expect("first verify");
    assert_eq!(first.status, PaymentStatus::Paid);

    let second = processor
        .verify_payment(&store, "order_idem", "pay_1", &sig, None, json!({}))
        .await
        .expect("second verify");
    assert_eq!(second.status, PaymentStatus::Paid);

    assert_eq!(store.logs_with_status("paid"), 1);
}

#[tokio::test]
async fn tampered_verify_fails_record_then_webhook_recovers_it() {
    let store = MemoryStore::default();
    store.seed(PaymentStatus::Created, "order_tamper", None);
    let processor = offline_engine();

    let err = processor
        .verify_payment(&store, "order_tamper", "pay_2", "deadbeef", None, json!({}))
        .await
        .expect_err("tampered signature must be rejected");
    assert!(matches!(err, AppError::InvalidSignature(_)));
    assert_eq!(store.status_of("order_tamper"), PaymentStatus::Failed);
    assert_eq!(store.logs_with_status("failed"), 1);

    // The gateway's own delivery carries independent trust.
    let (body, sig) = signed_webhook(
        "payment.captured",
        json!({
            "payment": { "entity": {
                "id": "pay_2",
                "status": "captured",
                "order_id": "order_tamper",
                "amount": 50000,
                "currency": "INR",
            }}
        }),
    );
    processor
        .handle_webhook(&store, &body, &sig)
        .await
        .expect("webhook after local failure");

    assert_eq!(store.status_of("order_tamper"), PaymentStatus::Paid);
    assert_eq!(store.logs_with_status("paid"), 1);
}

#[tokio::test]
async fn webhook_for_unknown_order_acks_without_writes() {
    let store = MemoryStore::default();
    let processor = offline_engine();

    let (body, sig) = signed_webhook(
        "payment.captured",
        json!({
            "payment": { "entity": {
                "id": "pay_ghost",
                "status": "captured",
                "order_id": "order_nowhere",
                "amount": 100,
                "currency": "INR",
            }}
        }),
    );

    processor
        .handle_webhook(&store, &body, &sig)
        .await
        .expect("unknown order is acked");

    assert!(store.payments.lock().unwrap().is_empty());
    assert_eq!(store.log_count(), 0);
}

#[tokio::test]
async fn webhook_replay_after_paid_logs_once_without_transition() {
    let store = MemoryStore::default();
    let id = store.seed(PaymentStatus::Paid, "order_replay", Some("pay_3"));
    let processor = offline_engine();

    let (body, sig) = signed_webhook(
        "payment.captured",
        json!({
            "payment": { "entity": {
                "id": "pay_3",
                "status": "captured",
                "order_id": "order_replay",
                "amount": 50000,
                "currency": "INR",
            }}
        }),
    );

    processor
        .handle_webhook(&store, &body, &sig)
        .await
        .expect("replayed capture is acked");

    assert_eq!(store.status_of("order_replay"), PaymentStatus::Paid);
    // One audit entry for the delivery, none for a transition.
    assert_eq!(store.log_count(), 1);
    assert_eq!(store.logs.lock().unwrap()[0].payment_ref, id);
}

#[tokio::test]
async fn webhook_failed_never_downgrades_paid() {
    let store = MemoryStore::default();
    store.seed(PaymentStatus::Paid, "order_late_fail", Some("pay_4"));
    let processor = offline_engine();

    let (body, sig) = signed_webhook(
        "payment.failed",
        json!({
            "payment": { "entity": {
                "id": "pay_4",
                "status": "failed",
                "order_id": "order_late_fail",
                "amount": 50000,
                "currency": "INR",
            }}
        }),
    );

    processor
        .handle_webhook(&store, &body, &sig)
        .await
        .expect("late failure is acked");

    assert_eq!(store.status_of("order_late_fail"), PaymentStatus::Paid);
    assert_eq!(store.logs_with_status("failed"), 0);
}

#[tokio::test]
async fn refund_rejected_outside_paid_state() {
    let processor = offline_engine();

    for (n, status) in [
        PaymentStatus::Created,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ]
    .into_iter()
    .enumerate()
    {
        let store = MemoryStore::default();
        let order_id = format!("order_refund_{}", n);
        let payment_id = format!("pay_refund_{}", n);
        store.seed(status, &order_id, Some(&payment_id));

        let err = processor
            .refund(&store, &payment_id, None)
            .await
            .expect_err("refund outside paid must be rejected");
        assert!(
            matches!(err, AppError::InvalidState(_)),
            "{:?} gave {:?}",
            status,
            err
        );
        assert_eq!(store.status_of(&order_id), status);
        assert_eq!(store.log_count(), 0);
    }
}

#[tokio::test]
async fn refund_for_unknown_payment_is_not_found() {
    let store = MemoryStore::default();
    let processor = offline_engine();

    let err = processor
        .refund(&store, "pay_missing", None)
        .await
        .expect_err("unknown payment");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn refund_moves_paid_record_to_refunded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments/pay_5/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rfnd_1",
            "amount": 50000,
            "currency": "INR",
            "payment_id": "pay_5",
            "status": "processed",
            "created_at": 1724900000,
        })))
        .mount(&mock_server)
        .await;

    let store = MemoryStore::default();
    store.seed(PaymentStatus::Paid, "order_refund_ok", Some("pay_5"));
    let processor = engine(&mock_server.uri());

    let outcome = processor
        .refund(&store, "pay_5", None)
        .await
        .expect("refund of paid record");

    assert_eq!(outcome.refund.id, "rfnd_1");
    assert_eq!(outcome.payment.status, PaymentStatus::Refunded);
    assert_eq!(store.status_of("order_refund_ok"), PaymentStatus::Refunded);
    assert_eq!(store.logs_with_status("refunded"), 1);
}

#[tokio::test]
async fn partial_refund_over_payment_amount_is_rejected() {
    let store = MemoryStore::default();
    store.seed(PaymentStatus::Paid, "order_over", Some("pay_6"));
    let processor = offline_engine();

    // Seeded amount is 50000 minor units (500.00 major).
    let err = processor
        .refund(&store, "pay_6", Some(600.0))
        .await
        .expect_err("over-refund must be rejected");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(store.status_of("order_over"), PaymentStatus::Paid);
}
