//! HMAC-SHA256 signature checks for the two gateway trust paths.
//!
//! The checkout verify path signs `"{order_id}|{payment_id}"` with the API
//! key secret; the webhook path signs the exact raw request body with the
//! webhook secret. The secrets are never interchangeable. These functions
//! are the sole trust boundary: no state mutation happens before they pass.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the checkout signature the client reports after the payment UI
/// succeeds. Returns false on any failure, including malformed hex; never
/// panics or errors.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let message = format!("{}|{}", order_id, payment_id);
    verify_hex_hmac(message.as_bytes(), signature, secret)
}

/// Verify a webhook delivery against the exact transport bytes. A
/// re-serialized body will not match, so callers must pass the raw body.
pub fn verify_webhook_signature(raw_body: &[u8], signature: &str, secret: &str) -> bool {
    verify_hex_hmac(raw_body, signature, secret)
}

fn verify_hex_hmac(message: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);

    // verify_slice compares in constant time
    mac.verify_slice(&provided).is_ok()
}

/// Compute the hex signature for a message. Used by tests and by tooling
/// that replays webhook deliveries against a local instance.
pub fn sign_hex(message: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "EnAtY1HnJlrGZfbVJqKMKfVP";

    fn checkout_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
        sign_hex(format!("{}|{}", order_id, payment_id).as_bytes(), secret)
    }

    #[test]
    fn accepts_correct_payment_signature() {
        let order_id = "order_DBJOWzybf0sJbb";
        let payment_id = "pay_DGR9FPNxfgIqvp";
        let signature = checkout_signature(order_id, payment_id, SECRET);

        assert!(verify_payment_signature(
            order_id,
            payment_id,
            &signature,
            SECRET
        ));
    }

    #[test]
    fn rejects_any_single_byte_mutation() {
        let order_id = "order_DBJOWzybf0sJbb";
        let payment_id = "pay_DGR9FPNxfgIqvp";
        let signature = checkout_signature(order_id, payment_id, SECRET);

        for i in 0..signature.len() {
            let mut mutated = signature.clone().into_bytes();
            mutated[i] = if mutated[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).unwrap();
            if mutated == signature {
                continue;
            }
            assert!(
                !verify_payment_signature(order_id, payment_id, &mutated, SECRET),
                "mutation at byte {} accepted",
                i
            );
        }
    }

    #[test]
    fn rejects_wrong_secret() {
        let signature = checkout_signature("order_a", "pay_b", SECRET);
        assert!(!verify_payment_signature(
            "order_a",
            "pay_b",
            &signature,
            "some_other_secret"
        ));
    }

    #[test]
    fn rejects_non_hex_signature_without_panicking() {
        assert!(!verify_payment_signature(
            "order_a",
            "pay_b",
            "not-hex-at-all!",
            SECRET
        ));
        assert!(!verify_payment_signature("order_a", "pay_b", "", SECRET));
    }

    #[test]
    fn webhook_signature_covers_exact_bytes() {
        let raw = br#"{"event":"payment.captured","payload":{ }}"#;
        let signature = sign_hex(raw, "whsec_123");

        assert!(verify_webhook_signature(raw, &signature, "whsec_123"));

        // Same JSON, different bytes: re-serialization must not match.
        let reserialized = br#"{"event":"payment.captured","payload":{}}"#;
        assert!(!verify_webhook_signature(
            reserialized,
            &signature,
            "whsec_123"
        ));
    }

    #[test]
    fn webhook_and_api_secrets_are_not_interchangeable() {
        let raw = br#"{"event":"payment.captured"}"#;
        let signature = sign_hex(raw, "webhook_secret");
        assert!(!verify_webhook_signature(raw, &signature, "api_secret"));
    }
}
