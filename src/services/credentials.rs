//! Credential service
//!
//! Registration, login and profile lookup on top of an `IdentityStore`.
//! Passwords only ever exist as Argon2id hashes; a successful register or
//! login returns a freshly issued session token.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{check_password, hash_password, IssuedToken, JwtValidator};
use crate::db::schemas::{IdentityDoc, IdentityLocation};
use crate::db::store::IdentityStore;
use crate::types::{GatewayError, Result};

const LOGIN_ROUTE: &str = "auth/login";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Body returned by register and login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub identity_id: String,
    pub expires_at: u64,
}

impl From<IssuedToken> for AuthResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            identity_id: issued.identity_id,
            expires_at: issued.expires_at,
        }
    }
}

/// Body returned by `GET /auth/me`
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

pub struct CredentialService {
    identities: Arc<dyn IdentityStore>,
    jwt: Arc<JwtValidator>,
}

impl CredentialService {
    pub fn new(identities: Arc<dyn IdentityStore>, jwt: Arc<JwtValidator>) -> Self {
        Self { identities, jwt }
    }

    /// Create an identity and issue its first token
    pub async fn register(&self, input: RegisterInput) -> Result<AuthResponse> {
        let name = required(input.name, "name")?;
        let phone = normalize_phone(&required(input.phone, "phone")?)?;
        let password = required(input.password, "password")?;

        // The store re-checks on insert
        if self.identities.find_by_phone(&phone).await?.is_some() {
            return Err(GatewayError::DuplicateIdentity);
        }

        let password_hash = hash_password(&password)?;
        let location = IdentityLocation {
            village: optional(input.village),
            district: optional(input.district),
            state: optional(input.state),
        };

        let identity = IdentityDoc::new(name, phone.clone(), location, password_hash);
        let id = self.identities.create(identity).await?;

        info!(identity = %id, "Registered identity");

        Ok(self.jwt.issue(&id.to_hex(), &phone)?.into())
    }

    /// Check a phone/password pair and issue a token
    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse> {
        let phone = required(input.phone, "phone")?;
        let password = required(input.password, "password")?;

        // A malformed phone cannot belong to anyone
        let phone = normalize_phone(&phone).map_err(|_| GatewayError::InvalidCredentials)?;

        let identity = match self.identities.find_by_phone(&phone).await? {
            Some(identity) => identity,
            None => {
                warn!(route = LOGIN_ROUTE, phone = %phone, "Login failed: unknown phone");
                return Err(GatewayError::InvalidCredentials);
            }
        };

        if let Err(e) = check_password(&password, &identity.password_hash) {
            if matches!(e, GatewayError::InvalidCredentials) {
                warn!(route = LOGIN_ROUTE, phone = %phone, "Login failed: wrong password");
            }
            return Err(e);
        }

        let id = identity
            ._id
            .ok_or_else(|| GatewayError::Internal("Identity has no id".into()))?;

        info!(identity = %id, "Login successful");

        Ok(self.jwt.issue(&id.to_hex(), &identity.phone)?.into())
    }

    /// Resolve the caller's profile
    pub async fn profile(&self, identity_id: &ObjectId) -> Result<ProfileResponse> {
        let identity = self
            .identities
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| GatewayError::Unauthenticated("Unknown identity".into()))?;

        Ok(ProfileResponse {
            id: identity_id.to_hex(),
            name: identity.name,
            phone: identity.phone,
            village: identity.village,
            district: identity.district,
            state: identity.state,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(GatewayError::Validation(format!("{} is required", field))),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Strip formatting from a phone number and check what remains.
///
/// Accepts an optional leading `+` followed by 7 to 15 digits.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok(cleaned)
    } else {
        Err(GatewayError::Validation("phone must be 7 to 15 digits".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::logging::capture::capture_logs;

    fn service() -> (CredentialService, Arc<JwtValidator>) {
        let jwt = Arc::new(JwtValidator::new_dev(3600));
        let store: Arc<dyn IdentityStore> = Arc::new(MemoryStore::new());
        (CredentialService::new(store, jwt.clone()), jwt)
    }

    fn register_input(phone: &str) -> RegisterInput {
        RegisterInput {
            name: Some("Ravi".into()),
            phone: Some(phone.into()),
            password: Some("monsoon-2024".into()),
            village: Some("Kheda".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+91 98765-43210").unwrap(), "+919876543210");
        assert_eq!(normalize_phone("(022) 2345 6789").unwrap(), "02223456789");
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("98765abc10").is_err());
        assert!(normalize_phone("++9876543210").is_err());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (service, jwt) = service();

        let registered = service.register(register_input("9876543210")).await.unwrap();
        let claims = jwt.verify_token(&registered.token).unwrap();
        assert_eq!(claims.sub, registered.identity_id);

        let logged_in = service
            .login(LoginInput {
                phone: Some("98765 43210".into()),
                password: Some("monsoon-2024".into()),
            })
            .await
            .unwrap();
        assert_eq!(logged_in.identity_id, registered.identity_id);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let (service, _) = service();
        service.register(register_input("9876543210")).await.unwrap();

        let err = service.register(register_input("98765-43210")).await.unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateIdentity));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_phone() {
        let (service, _) = service();
        service.register(register_input("9876543210")).await.unwrap();

        let wrong = service
            .login(LoginInput {
                phone: Some("9876543210".into()),
                password: Some("drought".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(wrong, GatewayError::InvalidCredentials));

        let unknown = service
            .login(LoginInput {
                phone: Some("9999999999".into()),
                password: Some("monsoon-2024".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(unknown, GatewayError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_failed_logins_are_logged_with_phone() {
        let (service, _) = service();
        service.register(register_input("9876543210")).await.unwrap();

        let (logs, _guard) = capture_logs();
        for (phone, password) in [("98765 43210", "drought"), ("99999-99999", "monsoon-2024")] {
            let err = service
                .login(LoginInput {
                    phone: Some(phone.into()),
                    password: Some(password.into()),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidCredentials));
        }

        let text = logs.text();
        assert_eq!(text.matches("auth/login").count(), 2);
        assert!(text.contains("wrong password"));
        assert!(text.contains("9876543210"));
        assert!(text.contains("unknown phone"));
        assert!(text.contains("9999999999"));
        assert!(!text.contains("drought"));
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let (service, _) = service();
        let err = service
            .register(RegisterInput {
                name: Some("  ".into()),
                phone: Some("9876543210".into()),
                password: Some("pw".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let (service, _) = service();
        let registered = service.register(register_input("9876543210")).await.unwrap();
        let id = ObjectId::parse_str(&registered.identity_id).unwrap();

        let profile = service.profile(&id).await.unwrap();
        assert_eq!(profile.name, "Ravi");
        assert_eq!(profile.village.as_deref(), Some("Kheda"));
        assert!(profile.district.is_none());

        let err = service.profile(&ObjectId::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unauthenticated(_)));
    }
}
