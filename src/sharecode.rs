use async_trait::async_trait;
use rand::Rng;

use crate::error::ApiError;

/// Unambiguous 32-character alphabet: no `I`, `O`, `1`, `0`.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;
const MAX_ATTEMPTS: u32 = 8;

/// Checked for collisions by the caller before a code is accepted —
/// typically a catalog lookup by share code or room code.
#[async_trait]
pub trait UniquenessCheck: Send + Sync {
    async fn is_taken(&self, code: &str) -> eyre::Result<bool>;
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generate a code uniformly at random, retrying on collision up to
/// `MAX_ATTEMPTS` times before failing with `ApiError::Collision`.
/// Codes are canonicalized to uppercase; callers doing lookups should
/// uppercase their input too.
pub async fn allocate(check: &dyn UniquenessCheck) -> Result<String, ApiError> {
    for _ in 0..MAX_ATTEMPTS {
        let code = random_code();
        let taken = check
            .is_taken(&code)
            .await
            .map_err(ApiError::Internal)?;
        if !taken {
            return Ok(code);
        }
    }
    Err(ApiError::Collision)
}

/// Canonicalize user-supplied share/room codes to uppercase for
/// case-insensitive lookup.
pub fn canonicalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedCheck {
        collide_codes: Vec<String>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl UniquenessCheck for ScriptedCheck {
        async fn is_taken(&self, code: &str) -> eyre::Result<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((n as usize) < self.collide_codes.len() && code != "UNUSED")
        }
    }

    #[tokio::test]
    async fn allocate_succeeds_without_collision() {
        struct AlwaysFree;
        #[async_trait]
        impl UniquenessCheck for AlwaysFree {
            async fn is_taken(&self, _code: &str) -> eyre::Result<bool> {
                Ok(false)
            }
        }
        let code = allocate(&AlwaysFree).await.unwrap();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.chars().all(|c| ALPHABET.contains(&(c as u8))));
    }

    #[tokio::test]
    async fn allocate_exhausts_after_max_attempts() {
        struct AlwaysTaken;
        #[async_trait]
        impl UniquenessCheck for AlwaysTaken {
            async fn is_taken(&self, _code: &str) -> eyre::Result<bool> {
                Ok(true)
            }
        }
        let err = allocate(&AlwaysTaken).await.unwrap_err();
        assert!(matches!(err, ApiError::Collision));
    }

    #[tokio::test]
    async fn allocate_retries_then_succeeds_within_bound() {
        // N=8 retries is the floor; 3 forced collisions then free must succeed.
        let check = ScriptedCheck {
            collide_codes: vec!["x".into(), "x".into(), "x".into()],
            calls: AtomicU32::new(0),
        };
        let code = allocate(&check).await.unwrap();
        assert_eq!(code.len(), CODE_LEN);
    }

    #[test]
    fn canonicalize_uppercases_and_trims() {
        assert_eq!(canonicalize(" abcdef "), "ABCDEF");
    }
}
