//! Password hashing and bearer tokens.
//!
//! Tokens are HS256 JSON web tokens: a fixed header, a JSON claims segment and
//! an HMAC-SHA256 signature, each base64url-encoded without padding and joined
//! with dots. The only identity a token carries is the user's email; it is
//! resolved back to a user on every request.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Signing key length used when no secret is configured.
const RANDOM_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user the token was issued to.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token lifetime reaches past the representable range")]
    ExpiryOutOfRange,
}

pub struct TokenCodec {
    key: Vec<u8>,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self { key: key.into(), ttl }
    }

    /// Tokens signed with a random key do not survive a restart.
    pub fn with_random_key(ttl: Duration) -> Self {
        let mut key = vec![0u8; RANDOM_KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key, ttl }
    }

    pub fn issue(&self, identity: &str) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn issue_at(&self, identity: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: String::from(identity),
            iat: now.timestamp(),
            exp: now.checked_add_signed(self.ttl).ok_or(TokenError::ExpiryOutOfRange)?.timestamp(),
            jti: Uuid::new_v4(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload),
        );

        let mut mac = self.signer();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut segments = token.split('.');
        let (header, payload, signature) = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(TokenError::Malformed),
        };

        if header != URL_SAFE_NO_PAD.encode(HEADER) {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.signer();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn signer(&self) -> Hmac<Sha256> {
        // HMAC pads or digests the key, so any length is accepted
        <Hmac<Sha256>>::new_from_slice(&self.key).expect("HMAC takes keys of any length")
    }
}

/// Salted bcrypt hashing, run on the blocking pool since each call is
/// deliberately slow.
///
/// bcrypt ignores everything past 72 bytes, so passwords are first reduced
/// to a base64 SHA-256 digest, which always fits.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Cheapest cost bcrypt accepts; keeps tests fast.
    #[cfg(test)]
    pub const fn fastest() -> Self {
        Self { cost: 4 }
    }

    pub async fn hash(&self, password: String) -> Result<String, ApiError> {
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(prehash(&password), cost)).await??;
        Ok(hashed)
    }

    pub async fn verify(&self, password: String, hashed: String) -> Result<bool, ApiError> {
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(prehash(&password), &hashed)).await??;
        Ok(matches)
    }
}

fn prehash(password: &str) -> String {
    STANDARD.encode(<Sha256 as sha2::Digest>::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", Duration::minutes(15))
    }

    #[test]
    fn issued_token_verifies_to_its_identity() {
        let codec = codec();
        let token = codec.issue("a@x.com").unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let issued = Utc::now() - Duration::minutes(16);
        let token = codec.issue_at("a@x.com", issued).unwrap();
        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_from_another_key_is_rejected() {
        let token = TokenCodec::with_random_key(Duration::minutes(15)).issue("a@x.com").unwrap();
        assert_eq!(codec().verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let codec = codec();
        let token = codec.issue("user@x.com").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = Claims {
            sub: String::from("admin@x.com"),
            iat: 0,
            exp: i64::MAX,
            jti: Uuid::new_v4(),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(codec.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c.d"), Err(TokenError::Malformed));
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() {
        let codec = TokenCodec::new("test-secret", Duration::days(200_000_000));
        assert_eq!(codec.issue("a@x.com"), Err(TokenError::ExpiryOutOfRange));
    }

    #[tokio::test]
    async fn passwords_differing_after_72_bytes_do_not_match() {
        let hasher = PasswordHasher::fastest();
        let prefix = "a".repeat(72);
        let hashed = hasher.hash(format!("{prefix}RIGHT")).await.unwrap();
        assert!(hasher.verify(format!("{prefix}RIGHT"), hashed.clone()).await.unwrap());
        assert!(!hasher.verify(format!("{prefix}WRONG"), hashed).await.unwrap());
    }

    #[tokio::test]
    async fn password_hash_verifies_only_the_original() {
        let hasher = PasswordHasher::fastest();
        let hashed = hasher.hash(String::from("password123")).await.unwrap();
        assert_ne!(hashed, "password123");
        assert!(hasher.verify(String::from("password123"), hashed.clone()).await.unwrap());
        assert!(!hasher.verify(String::from("wrongpassword"), hashed).await.unwrap());
    }
}
