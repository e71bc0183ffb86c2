//! Authentication for the gateway
//!
//! Provides:
//! - JWT session token issuance and verification
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, IssuedToken, JwtValidator};
pub use password::{check_password, hash_password};
