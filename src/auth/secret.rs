//! Signing secret generation for JWT_SECRET_KEY / JWT_REFRESH_SECRET_KEY

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Default key size in bytes (512 bits)
pub const DEFAULT_SECRET_BYTES: usize = 64;

/// Smallest key that still satisfies the 32-character secret minimum
pub const MIN_SECRET_BYTES: usize = 24;

/// Signing secret generator
pub struct SecretGenerator;

impl SecretGenerator {
    /// Generate `length` random bytes from the OS RNG, URL-safe base64 encoded
    pub fn generate(length: usize) -> String {
        let mut key = vec![0u8; length];
        OsRng.fill_bytes(&mut key);
        URL_SAFE.encode(key)
    }
}
