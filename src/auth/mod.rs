//! Authentication module: password hashing, token service, request gate

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod secret;

pub use jwt::{Claims, JwtService, TokenError, TokenKind, TokenPair};
pub use middleware::{extract_token, jwt_auth_middleware, AuthContext};
pub use password::{PasswordError, PasswordHasher};
pub use secret::SecretGenerator;
