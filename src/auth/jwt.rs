//! Verification of identity-provider access tokens

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// JWT-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Marketplace role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Transporter,
    Client,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserRole::Transporter => "transporter",
            UserRole::Client => "client",
            UserRole::Admin => "admin",
        })
    }
}

/// Claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Who a verified token belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// HS256 verifier for bearer tokens
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify `token` and resolve its identity.
    pub fn verify(&self, token: &str) -> Result<Identity, JwtError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;
        let claims = data.claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| JwtError::InvalidToken(format!("bad subject: {}", e)))?;

        let role = match claims.role.as_str() {
            "transporter" => UserRole::Transporter,
            "client" => UserRole::Client,
            "admin" => UserRole::Admin,
            other => return Err(JwtError::UnknownRole(other.to_string())),
        };

        Ok(Identity {
            user_id,
            email: claims.email,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, role: &str, exp_offset: Duration, iss: Option<&str>) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "client@example.com".to_string(),
            role: role.to_string(),
            exp: (Utc::now() + exp_offset).timestamp(),
            iss: iss.map(str::to_string),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_resolves_identity() {
        let verifier = JwtVerifier::new("test-secret-key", None);
        let identity = verifier
            .verify(&token("test-secret-key", "transporter", Duration::minutes(5), None))
            .unwrap();
        assert_eq!(identity.role, UserRole::Transporter);
        assert_eq!(identity.email, "client@example.com");
    }

    #[test]
    fn test_wrong_secret() {
        let verifier = JwtVerifier::new("secret2", None);
        let result = verifier.verify(&token("secret1", "client", Duration::minutes(5), None));
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token() {
        let verifier = JwtVerifier::new("s", None);
        let result = verifier.verify(&token("s", "client", Duration::minutes(-10), None));
        assert_eq!(result, Err(JwtError::TokenExpired));
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let verifier = JwtVerifier::new("s", Some("https://id.example.com"));
        assert!(verifier
            .verify(&token("s", "client", Duration::minutes(5), Some("https://other")))
            .is_err());
        assert!(verifier
            .verify(&token(
                "s",
                "client",
                Duration::minutes(5),
                Some("https://id.example.com")
            ))
            .is_ok());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let verifier = JwtVerifier::new("s", None);
        let result = verifier.verify(&token("s", "buyer", Duration::minutes(5), None));
        assert_eq!(result, Err(JwtError::UnknownRole("buyer".to_string())));
    }
}
