use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::User;

/// ClaimedUser
///
/// The projection of a `User` embedded in every token. It carries every public
/// field plus `updated_at`, so any later write to the user (including a password
/// change) makes the stored record diverge from the token and the token stops
/// being accepted. The password hash is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedUser {
    /// Subject (sub): the user's id.
    pub sub: i32,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for ClaimedUser {
    fn from(user: &User) -> Self {
        Self {
            sub: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            age: user.age,
            updated_at: user.updated_at,
        }
    }
}

impl ClaimedUser {
    /// True when `user` is still exactly the record this claim was issued for.
    pub fn matches(&self, user: &User) -> bool {
        *self == ClaimedUser::from(user)
    }
}

/// Claims
///
/// The full signed payload: the user projection plus the registered time claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub user: ClaimedUser,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp): tokens are rejected after this instant.
    pub exp: usize,
}

/// TokenError
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, expired, or a payload that is not a claim.
    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    /// `iat + ttl` does not fit in a timestamp.
    #[error("token lifetime of {0}s is out of range")]
    TtlOverflow(u64),
}

/// TokenCodec
///
/// Signs and verifies HS256 tokens with a secret injected at construction.
/// One instance is built at startup and shared read-only across requests.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

/// TokenState
///
/// The shared handle stored in `AppState`.
pub type TokenState = Arc<TokenCodec>;

impl TokenCodec {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        }
    }

    /// Issues a token for `user`, valid for the configured TTL from now.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp().max(0) as usize;
        let exp = usize::try_from(self.ttl_secs)
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or(TokenError::TtlOverflow(self.ttl_secs))?;
        let claims = Claims {
            user: ClaimedUser::from(user),
            iat,
            exp,
        };
        self.encode(&claims)
    }

    /// Signs an already-built claim set.
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    /// Verifies signature and expiry, then deserializes the claim set.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::InvalidToken)
    }
}
