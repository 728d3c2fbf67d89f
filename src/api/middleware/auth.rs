use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

/// Identity of the caller, resolved from the bearer credential. The token
/// is opaque to the payment core: all it consumes is the user id it names.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Bearer-token middleware for the payment routes. The webhook route is
/// not behind this: it authenticates with the gateway signature instead.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Err(
            AppError::Authentication("Missing auth token".to_string()).into_response(),
        );
    };

    match verify_token(token, &state.config.auth.token_secret) {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthUser { user_id });
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected bearer token");
            Err(AppError::Authentication("Unauthorized".to_string()).into_response())
        }
    }
}

/// Validate a credential and return the user id it names.
pub fn verify_token(token: &str, secret: &str) -> Result<String, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

    Ok(data.claims.sub)
}

/// Mint a credential for a user id. The identity service is the normal
/// issuer; this exists for tooling and tests.
pub fn issue_token(user_id: &str, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to issue token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = issue_token("user-42", "secret", 3600).unwrap();
        let user_id = verify_token(&token, "secret").unwrap();
        assert_eq!(user_id, "user-42");
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue_token("user-42", "secret", 3600).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        // Past the default validation leeway.
        let token = issue_token("user-42", "secret", -3600).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(verify_token("not-a-token", "secret").is_err());
    }
}
