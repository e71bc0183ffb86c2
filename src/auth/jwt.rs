//! JWT session tokens
//!
//! Tokens are signed with HS256 and carry the identity id in `sub` plus an
//! absolute `exp`. They are stateless: there is no server-side revocation.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::DEV_JWT_SECRET;
use crate::types::GatewayError;

/// Payload stored in JWT token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id (hex ObjectId)
    pub sub: String,
    /// Phone number the identity registered with
    pub phone: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub identity_id: String,
    pub expires_at: u64,
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a new JWT validator
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: &str, expiry_seconds: u64) -> Result<Self, GatewayError> {
        if secret.is_empty() {
            return Err(GatewayError::Config("JWT_SECRET is required".into()));
        }

        if secret.len() < 32 {
            return Err(GatewayError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        })
    }

    /// Create a validator for dev mode
    pub fn new_dev(expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(DEV_JWT_SECRET.as_bytes()),
            decoding_key: DecodingKey::from_secret(DEV_JWT_SECRET.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for an identity, valid for `expiry_seconds` from now
    pub fn issue(&self, identity_id: &str, phone: &str) -> Result<IssuedToken, GatewayError> {
        self.issue_at(identity_id, phone, unix_now()?)
    }

    /// Issue a token with an explicit issuance time
    pub fn issue_at(
        &self,
        identity_id: &str,
        phone: &str,
        issued_at: u64,
    ) -> Result<IssuedToken, GatewayError> {
        let claims = Claims {
            sub: identity_id.to_string(),
            phone: phone.to_string(),
            iat: issued_at,
            exp: issued_at + self.expiry_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            token,
            identity_id: claims.sub,
            expires_at: claims.exp,
        })
    }

    /// Verify and decode a JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, GatewayError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                use jsonwebtoken::errors::ErrorKind;
                let message = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    ErrorKind::InvalidToken => "Invalid token",
                    _ => "Token validation failed",
                };
                GatewayError::Unauthenticated(message.into())
            })?;

        if claims.sub.is_empty() {
            return Err(GatewayError::Unauthenticated("Invalid token".into()));
        }

        Ok(claims)
    }
}

fn unix_now() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| GatewayError::Internal(format!("System time error: {}", e)))
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
