//! Access tokens and password hashing.
//!
//! A token is a base64url-encoded JSON document carrying the user id, an
//! expiry timestamp, and an Ed25519 signature over both.  The server is the
//! only party holding the signing key, so tokens need no server-side session
//! state; a restart with a fresh ephemeral key simply invalidates them all.

use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vidora_store::Viewer;

use crate::error::ServerError;

/// How long an issued token stays valid.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// The signed token document, as carried inside the bearer string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

/// Holds the token signing key and issues/verifies bearer strings.
#[derive(Clone)]
pub struct TokenKeys {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TokenKeys {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Generate a fresh random key.  Tokens signed with it die with the
    /// process.
    pub fn ephemeral() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Issue a bearer string for `user_id`, valid for [`TOKEN_TTL_DAYS`].
    pub fn issue(&self, user_id: Uuid) -> Result<String, ServerError> {
        let expires_at = Utc::now() + Duration::days(TOKEN_TTL_DAYS);
        let signature = self.signing_key.sign(&token_payload(user_id, expires_at));

        let token = AccessToken {
            user_id,
            expires_at,
            signature: signature.to_bytes().to_vec(),
        };
        let json = serde_json::to_vec(&token)
            .map_err(|e| ServerError::Internal(format!("Failed to encode token: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode and verify a bearer string.  Returns the user id only when the
    /// signature checks out and the token has not expired.
    pub fn verify(&self, bearer: &str) -> Option<Uuid> {
        let json = URL_SAFE_NO_PAD.decode(bearer).ok()?;
        let token: AccessToken = serde_json::from_slice(&json).ok()?;

        if Utc::now() > token.expires_at {
            return None;
        }

        let signature = Signature::from_slice(&token.signature).ok()?;
        self.verifying_key
            .verify(&token_payload(token.user_id, token.expires_at), &signature)
            .ok()?;

        Some(token.user_id)
    }
}

// payload = user_id bytes || expires_at (rfc3339)
fn token_payload(user_id: Uuid, expires_at: DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(user_id.as_bytes());
    payload.extend_from_slice(expires_at.to_rfc3339().as_bytes());
    payload
}

/// Resolve the request's identity from the `Authorization` header.
///
/// A missing, malformed, expired, or forged credential all degrade to
/// [`Viewer::Anonymous`]; read endpoints keep working, they just lose the
/// personalized bits.
pub fn viewer_from_headers(headers: &HeaderMap, keys: &TokenKeys) -> Viewer {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let bearer = auth.strip_prefix("Bearer ").unwrap_or(auth);

    match keys.verify(bearer) {
        Some(user_id) => Viewer::Verified(user_id),
        None => Viewer::Anonymous,
    }
}

/// Like [`viewer_from_headers`], but mutating endpoints need a verified user.
pub fn require_user(headers: &HeaderMap, keys: &TokenKeys) -> Result<Uuid, ServerError> {
    match viewer_from_headers(headers, keys) {
        Viewer::Verified(user_id) => Ok(user_id),
        Viewer::Anonymous => Err(ServerError::Unauthorized),
    }
}

/// Hash a password into PHC string format.
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServerError::Internal(format!("Failed to hash password: {e}")))
}

/// Check a password against a stored PHC hash.  Any parse or verification
/// failure is just "wrong password".
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let keys = TokenKeys::ephemeral();
        let user_id = Uuid::new_v4();

        let bearer = keys.issue(user_id).unwrap();
        assert_eq!(keys.verify(&bearer), Some(user_id));
    }

    #[test]
    fn test_token_wrong_key_rejected() {
        let keys = TokenKeys::ephemeral();
        let other = TokenKeys::ephemeral();

        let bearer = keys.issue(Uuid::new_v4()).unwrap();
        assert_eq!(other.verify(&bearer), None);
    }

    #[test]
    fn test_token_expired_rejected() {
        let keys = TokenKeys::ephemeral();
        let user_id = Uuid::new_v4();

        // Forge an already-expired token with the real key; the signature is
        // valid, the expiry is not.
        let expires_at = Utc::now() - Duration::days(1);
        let signature = keys.signing_key.sign(&token_payload(user_id, expires_at));
        let token = AccessToken {
            user_id,
            expires_at,
            signature: signature.to_bytes().to_vec(),
        };
        let bearer = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&token).unwrap());

        assert_eq!(keys.verify(&bearer), None);
    }

    #[test]
    fn test_token_tampered_user_rejected() {
        let keys = TokenKeys::ephemeral();
        let bearer = keys.issue(Uuid::new_v4()).unwrap();

        let json = URL_SAFE_NO_PAD.decode(&bearer).unwrap();
        let mut token: AccessToken = serde_json::from_slice(&json).unwrap();
        token.user_id = Uuid::new_v4();
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&token).unwrap());

        assert_eq!(keys.verify(&forged), None);
    }

    #[test]
    fn test_garbage_bearer_is_anonymous() {
        let keys = TokenKeys::ephemeral();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer not-a-token".parse().unwrap());

        assert_eq!(viewer_from_headers(&headers, &keys), Viewer::Anonymous);
        assert!(matches!(
            require_user(&headers, &keys),
            Err(ServerError::Unauthorized)
        ));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }
}
