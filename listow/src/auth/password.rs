//! Password hashing and verification, plus one-time reset codes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::prelude::RngExt;
use rand::rng;

use crate::errors::Error;

/// Number of digits in an emailed reset code.
pub const RESET_CODE_LENGTH: usize = 6;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC recommendations
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Hash a string using Argon2 (used for passwords and reset codes).
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a string against a hash. The parameters embedded in the hash are used.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Generate a zero-padded six digit reset code.
pub fn generate_reset_code() -> String {
    let code: u32 = rng().random_range(0..1_000_000);
    format!("{code:0width$}", width = RESET_CODE_LENGTH)
}

/// Whether `code` has the shape of a reset code (exactly six ASCII digits).
pub fn is_reset_code(code: &str) -> bool {
    code.len() == RESET_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Hash on a blocking thread so the async runtime keeps serving requests.
pub async fn hash_blocking(input: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string_with_params(&input, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify on a blocking thread.
pub async fn verify_blocking(input: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_string(&input, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Option<Argon2Params> {
        Some(Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_string_hashing() {
        let hash = hash_string_with_params("secret1", fast()).unwrap();

        assert!(verify_string("secret1", &hash).unwrap());
        assert!(!verify_string("secret2", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string_with_params("same_password", fast()).unwrap();
        let hash2 = hash_string_with_params("same_password", fast()).unwrap();

        // Salted
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(verify_string("x", "not-a-phc-string"), Err(Error::Internal { .. })));
    }

    #[test]
    fn test_generate_reset_code() {
        for _ in 0..50 {
            let code = generate_reset_code();
            assert!(is_reset_code(&code), "bad code {code}");
        }
    }

    #[test]
    fn test_is_reset_code() {
        assert!(is_reset_code("012345"));
        assert!(!is_reset_code("12345"));
        assert!(!is_reset_code("1234567"));
        assert!(!is_reset_code("12a456"));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let params = fast().unwrap();
        let hash = hash_blocking("secret1".to_string(), params).await.unwrap();
        assert!(verify_blocking("secret1".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_blocking("nope".to_string(), hash).await.unwrap());
    }
}
