//! A minimal HMAC-SHA256 bearer token: `base64url(header).base64url(claims).base64url(sig)`.
//! Deliberately not a full JOSE/JWT implementation: only `HS256`,
//! only `sub`+`exp` claims, there is exactly one algorithm and one key, so
//! the usual `alg` confusion attacks against general-purpose JWT libraries
//! don't apply here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"ATRIUM"}"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

fn sign(secret: &str, header_b64: &str, claims_b64: &str) -> Result<String, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Malformed)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

pub fn issue(secret: &str, user_id: Uuid, ttl_seconds: i64, now: DateTime<Utc>) -> String {
    let claims = Claims {
        sub: user_id,
        exp: (now.timestamp() + ttl_seconds),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(HEADER);
    let claims_json = serde_json::to_string(&claims).expect("Claims always serializes");
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);
    let sig = sign(secret, &header_b64, &claims_b64).expect("hmac accepts any key length");
    format!("{header_b64}.{claims_b64}.{sig}")
}

/// Verifies the signature with a constant-time comparison, then checks `exp`
/// against `now` with `clock_skew_seconds` of tolerance.
pub fn validate(
    secret: &str,
    token: &str,
    now: DateTime<Utc>,
    clock_skew_seconds: i64,
) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => return Err(TokenError::Malformed),
    };

    let expected_sig = sign(secret, header_b64, claims_b64)?;
    let got = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| TokenError::Malformed)?;
    let want = URL_SAFE_NO_PAD.decode(&expected_sig).map_err(|_| TokenError::Malformed)?;
    if got.len() != want.len() || got.ct_eq(&want).unwrap_u8() != 1 {
        return Err(TokenError::BadSignature);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&claims_json).map_err(|_| TokenError::Malformed)?;

    let skew = chrono::Duration::seconds(clock_skew_seconds);
    if now - skew > DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)? {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips() {
        let secret = "test-secret";
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let token = issue(secret, user_id, 3600, now);
        let claims = validate(secret, &token, now, 60).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = "test-secret";
        let now = Utc::now();
        let token = issue(secret, Uuid::new_v4(), 3600, now);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "ZGVmaW5pdGVseS1ub3QtdmFsaWQ";
        let tampered = parts.join(".");
        assert_eq!(validate(secret, &tampered, now, 60), Err(TokenError::BadSignature));
    }

    #[test]
    fn expired_token_is_rejected_past_clock_skew() {
        let secret = "test-secret";
        let now = Utc::now();
        let token = issue(secret, Uuid::new_v4(), -120, now);
        assert_eq!(validate(secret, &token, now, 60), Err(TokenError::Expired));
    }

    #[test]
    fn expired_token_within_clock_skew_is_accepted() {
        let secret = "test-secret";
        let now = Utc::now();
        let token = issue(secret, Uuid::new_v4(), -30, now);
        assert!(validate(secret, &token, now, 60).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = issue("secret-a", Uuid::new_v4(), 3600, now);
        assert_eq!(
            validate("secret-b", &token, now, 60),
            Err(TokenError::BadSignature)
        );
    }
}
