use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

use crate::error::ApiError;

/// Hashes run on `spawn_blocking` — Argon2 is intentionally slow and
/// memory-hard, so it has no business running on a Tokio worker thread.
/// Salts per-hash automatically.
pub async fn hash(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| eyre::eyre!("password hash failed: {e}"))
    })
    .await
    .map_err(|e| eyre::eyre!("password hashing task panicked: {e}"))?
    .map_err(ApiError::Internal)
}

/// Constant-time verification via `argon2`'s own comparison; runtime
/// does not depend on how many leading characters of the candidate
/// match the original.
pub async fn verify(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(false),
        };
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| eyre::eyre!("password verification task panicked: {e}"))?
    .map_err(ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_roundtrips() {
        let h = hash("hunter2".to_string()).await.unwrap();
        assert!(verify("hunter2".to_string(), h.clone()).await.unwrap());
        assert!(!verify("wrong".to_string(), h).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently_due_to_salt() {
        let a = hash("hunter2".to_string()).await.unwrap();
        let b = hash("hunter2".to_string()).await.unwrap();
        assert_ne!(a, b);
    }
}
