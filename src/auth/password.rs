//! bcrypt hashing, kept off the async executor.

use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    match tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(e)) => Err(ApiError::internal(format!("failed to hash password: {e}"))),
        Err(e) => Err(ApiError::internal(format!(
            "spawn_blocking panic during hash: {e}"
        ))),
    }
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(valid)) => Ok(valid),
        Ok(Err(e)) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            Ok(false)
        }
        Err(e) => Err(ApiError::internal(format!(
            "spawn_blocking panic during verify: {e}"
        ))),
    }
}

/// Hash verified against when a login names no known account, so unknown
/// and known emails cost the same bcrypt work.
pub fn decoy_hash(cost: u32) -> String {
    let password = generate_reset_token();
    match bcrypt::hash(password, cost) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!("Could not prepare decoy password hash: {}", e);
            String::new()
        }
    }
}

/// Random single-use token for password resets.
pub fn generate_reset_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 48)
}

/// Only the SHA-256 digest of a reset token is stored.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decoy_hash_is_real_bcrypt_and_never_matches() {
        let hash = decoy_hash(4);
        assert!(hash.starts_with("$2"));
        assert!(bcrypt::verify("longenough1", &hash).is_ok());
        assert!(!verify_password("longenough1".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("longenough1".to_string(), 4).await.unwrap();
        assert!(verify_password("longenough1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("wrong-password".to_string(), hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_garbage_hash_is_a_mismatch() {
        let result = verify_password("anything".to_string(), "not-a-hash".to_string()).await;
        assert!(!result.unwrap());
    }

    #[test]
    fn test_password_length_rule() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough1").is_ok());
    }

    #[test]
    fn test_reset_token_hash_is_stable_hex() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 48);
        let digest = hash_reset_token(&token);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_reset_token(&token));
        assert_ne!(digest, hash_reset_token("other"));
    }
}
