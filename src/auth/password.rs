//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Password hashing failures
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password and hash must not be empty")]
    EmptyInput,

    #[error("password does not match")]
    Mismatch,

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("invalid hasher parameters: {0}")]
    Configuration(String),
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::EmptyInput => AppError::validation("Password must not be empty"),
            PasswordError::Mismatch => AppError::Unauthorized,
            PasswordError::MalformedHash(msg) | PasswordError::Hashing(msg) => {
                AppError::Internal(msg)
            }
            PasswordError::Configuration(msg) => AppError::Config(msg),
        }
    }
}

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        Self::with_params(65536, 3, 4).unwrap_or_else(|_| Self {
            argon2: Argon2::default(),
        })
    }

    /// Create hasher with an explicit work factor.
    ///
    /// Parameters outside the range accepted by Argon2 (zero iterations,
    /// memory below `8 * parallelism` KiB, ...) are rejected.
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::Configuration(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Ok(Self { argon2 })
    }

    /// Create hasher from the security section of the config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, PasswordError> {
        Self::with_params(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
            config.password_hash_parallelism,
        )
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyInput);
        }

        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                PasswordError::Hashing(e.to_string())
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        if password.is_empty() || hash.is_empty() {
            return Err(PasswordError::EmptyInput);
        }

        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            PasswordError::MalformedHash(e.to_string())
        })?;

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => PasswordError::Mismatch,
                other => PasswordError::Hashing(other.to_string()),
            })
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
        // Check length
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        // Check uppercase
        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::validation(
                "Password must contain at least one uppercase letter",
            ));
        }

        // Check digit
        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::validation("Password must contain at least one digit"));
        }

        // Check special character
        if policy.password_require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AppError::validation(
                "Password must contain at least one special character",
            ));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cheap parameters keep the test suite fast
    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let password = "TestPassword123!";

        let hash = hasher.hash(password).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        hasher.verify(password, &hash).unwrap();
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("TestPassword123!").unwrap();

        assert!(matches!(
            hasher.verify("WrongPassword", &hash),
            Err(PasswordError::Mismatch)
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        let hasher = fast_hasher();
        assert!(matches!(hasher.hash(""), Err(PasswordError::EmptyInput)));

        let hash = hasher.hash("secret123").unwrap();
        assert!(matches!(hasher.verify("", &hash), Err(PasswordError::EmptyInput)));
        assert!(matches!(hasher.verify("secret123", ""), Err(PasswordError::EmptyInput)));
    }

    #[test]
    fn test_malformed_hash() {
        let hasher = fast_hasher();
        assert!(matches!(
            hasher.verify("secret123", "not-a-phc-string"),
            Err(PasswordError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_out_of_range_parameters_rejected() {
        assert!(matches!(
            PasswordHasher::with_params(1024, 0, 1),
            Err(PasswordError::Configuration(_))
        ));
        assert!(matches!(
            PasswordHasher::with_params(1024, 1, 0),
            Err(PasswordError::Configuration(_))
        ));
        // memory must be at least 8 KiB per lane
        assert!(matches!(
            PasswordHasher::with_params(16, 1, 4),
            Err(PasswordError::Configuration(_))
        ));
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = fast_hasher();
        let password = "TestPassword123!";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        assert_ne!(hash1, hash2);
        hasher.verify(password, &hash1).unwrap();
        hasher.verify(password, &hash2).unwrap();
    }

    #[test]
    fn test_hash_verifies_across_work_factors() {
        // parameters are embedded in the PHC string
        let hash = PasswordHasher::with_params(2048, 2, 1).unwrap().hash("secret123").unwrap();
        fast_hasher().verify("secret123", &hash).unwrap();
    }
}
