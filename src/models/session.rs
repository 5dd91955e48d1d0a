//! Librarian credentials and bearer tokens

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Sign-in form, sent form-encoded
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-up form with password confirmation
#[derive(Debug, Clone, Validate)]
pub struct SignUp {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub confirm_password: String,
}

impl SignUp {
    /// Field checks plus the password confirmation; runs before any request
    pub fn into_credentials(self) -> AppResult<Credentials> {
        self.validate()?;
        if self.password != self.confirm_password {
            return Err(AppError::Validation("Please re-enter password and confirm!".to_string()));
        }
        Ok(Credentials {
            username: self.username,
            password: self.password,
        })
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Claims the client reads from a bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
}

/// Opaque signed bearer token.
///
/// The client cannot verify the signature (the key lives on the backend); it only
/// reads the `exp` claim to decide whether the session is still worth using.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the claims without verifying the signature
    pub fn claims(&self) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        decode::<TokenClaims>(&self.0, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let claims = self.claims()?;
        Utc.timestamp_opt(claims.exp, 0).single()
    }

    /// `exp * 1000 > now_ms`. Anything that cannot be decoded is expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.claims() {
            Some(claims) => claims.exp.saturating_mul(1000) > now.timestamp_millis(),
            None => false,
        }
    }
}

// Never print the credential itself
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Token").field(&"<redacted>").finish()
    }
}
