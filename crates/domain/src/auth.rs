//! Bearer tokens, password hashing and the authenticated requester.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use common::UserId;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use store::{Role, User};
use uuid::Uuid;

use crate::error::{DomainError, Result};

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the requester owns the resource or is an admin.
    pub fn ensure_owner_or_admin(&self, owner: UserId, what: &str) -> Result<()> {
        if self.user_id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::forbidden(format!("not allowed to access this {what}")))
        }
    }

    pub fn ensure_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::forbidden("admin role required"))
        }
    }
}

impl From<&User> for Requester {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 access tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verifies signature and expiry. Every failure is reported as `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected access token");
                DomainError::Unauthorized("invalid or expired token".to_string())
            })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Hashes a password with argon2 and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::PasswordHash(e.to_string()))
}

/// Checks a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = TokenService::new(b"test-secret", 3600);
        let user = User::new("a@example.com", "hash", "A", "B").with_role(Role::Admin);

        let issued = tokens.issue(&user).unwrap();
        let claims = tokens.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let user = User::new("a@example.com", "hash", "A", "B");
        let issued = TokenService::new(b"one", 3600).issue(&user).unwrap();
        let err = TokenService::new(b"two", 3600)
            .verify(&issued.token)
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s leeway.
        let tokens = TokenService::new(b"secret", -120);
        let user = User::new("a@example.com", "hash", "A", "B");
        let issued = tokens.issue(&user).unwrap();
        assert!(tokens.verify(&issued.token).is_err());
    }

    #[test]
    fn ownership_rules() {
        let owner = UserId::new();
        let user = Requester::new(owner, Role::User);
        let stranger = Requester::new(UserId::new(), Role::User);
        let admin = Requester::new(UserId::new(), Role::Admin);

        assert!(user.ensure_owner_or_admin(owner, "order").is_ok());
        assert!(admin.ensure_owner_or_admin(owner, "order").is_ok());
        assert!(matches!(
            stranger.ensure_owner_or_admin(owner, "order"),
            Err(DomainError::Forbidden(_))
        ));
        assert!(user.ensure_admin().is_err());
        assert!(admin.ensure_admin().is_ok());
    }
}
