//! Token signing and verification for the collect gateway.
//!
//! Every payload exchanged with the gateway is authenticated with a compact HS256 token minted from a pre-shared
//! key. Three token shapes exist:
//!
//! * collect-request tokens, covering `{school_id, amount, callback_url}`, sent when a payment is initiated;
//! * status-query tokens, covering `{school_id, collect_request_id}` with a bounded expiry, sent on every poll;
//! * webhook tokens, presented by the gateway when it pushes a settlement notification.
//!
//! Verification failure is always fatal to the request being served. There is no fallback path that treats an
//! unverified payload as verified.

use chrono::Utc;
use fpg_common::{Money, Secret};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validity window for status-query tokens. The gateway rejects anything older.
const STATUS_TOKEN_VALIDITY_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Could not sign payload: {0}")]
    Signing(String),
    #[error("Token verification failed: {0}")]
    Verification(String),
}

#[derive(Debug, Serialize)]
struct CollectRequestClaims<'a> {
    school_id: &'a str,
    amount: i64,
    callback_url: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusQueryClaims<'a> {
    school_id: &'a str,
    collect_request_id: &'a str,
    exp: i64,
}

/// Claims carried by the token a webhook caller presents in its `sign` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookClaims {
    pub collect_request_id: String,
    pub status: String,
}

#[derive(Clone)]
pub struct SignatureService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SignatureService {
    pub fn new(key: &Secret<String>) -> Self {
        let secret = key.reveal().as_bytes();
        Self { encoding_key: EncodingKey::from_secret(secret), decoding_key: DecodingKey::from_secret(secret) }
    }

    /// Sign the payload of a collect-request creation call.
    pub fn collect_request_token(
        &self,
        school_id: &str,
        amount: Money,
        callback_url: &str,
    ) -> Result<String, SignatureError> {
        let claims = CollectRequestClaims { school_id, amount: amount.value(), callback_url };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SignatureError::Signing(e.to_string()))
    }

    /// Sign a status query. The token expires after an hour, which is all the gateway will accept.
    pub fn status_query_token(&self, school_id: &str, collect_request_id: &str) -> Result<String, SignatureError> {
        let claims = StatusQueryClaims {
            school_id,
            collect_request_id,
            exp: Utc::now().timestamp() + STATUS_TOKEN_VALIDITY_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SignatureError::Signing(e.to_string()))
    }

    /// Verify the token presented by a webhook caller and return its claims.
    ///
    /// Webhook tokens carry no expiry; only the signature and claim shape are checked here. Matching the claims
    /// against the payload is the caller's job, since the payload must not be trusted until this call succeeds.
    pub fn verify_webhook_token(&self, token: &str) -> Result<WebhookClaims, SignatureError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<WebhookClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| SignatureError::Verification(e.to_string()))
    }

    /// Mint a webhook token. Only the gateway signs webhooks in production; this exists for tests and local
    /// gateway stubs.
    pub fn webhook_token(&self, claims: &WebhookClaims) -> Result<String, SignatureError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| SignatureError::Signing(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn service() -> SignatureService {
        SignatureService::new(&Secret::new("super-secret-signing-key".to_string()))
    }

    #[test]
    fn webhook_token_round_trip() {
        let svc = service();
        let claims = WebhookClaims { collect_request_id: "abc123".to_string(), status: "SUCCESS".to_string() };
        let token = svc.webhook_token(&claims).unwrap();
        let verified = svc.verify_webhook_token(&token).unwrap();
        assert_eq!(verified.collect_request_id, "abc123");
        assert_eq!(verified.status, "SUCCESS");
    }

    #[test]
    fn tampered_webhook_token_is_rejected() {
        let svc = service();
        let claims = WebhookClaims { collect_request_id: "abc123".to_string(), status: "SUCCESS".to_string() };
        let mut token = svc.webhook_token(&claims).unwrap();
        token.replace_range(token.len() - 6.., "000000");
        assert!(matches!(svc.verify_webhook_token(&token), Err(SignatureError::Verification(_))));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let svc = service();
        let other = SignatureService::new(&Secret::new("a-different-key".to_string()));
        let claims = WebhookClaims { collect_request_id: "abc123".to_string(), status: "SUCCESS".to_string() };
        let token = other.webhook_token(&claims).unwrap();
        assert!(svc.verify_webhook_token(&token).is_err());
    }

    #[test]
    fn collect_and_status_tokens_sign_without_error() {
        let svc = service();
        let t1 = svc.collect_request_token("SCHOOL-1", Money::from(1000), "https://fees.example.com/cb").unwrap();
        let t2 = svc.status_query_token("SCHOOL-1", "abc123").unwrap();
        assert_eq!(t1.split('.').count(), 3);
        assert_eq!(t2.split('.').count(), 3);
    }
}
