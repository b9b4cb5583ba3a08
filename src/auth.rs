use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::ApiError,
    models::User,
    repository::{RepoError, RepositoryState},
    token::TokenState,
};

pub const MISSING_HEADER: &str = "Authorization header must be provided";
pub const MALFORMED_HEADER: &str = "Malformed Authorization header (must be 'Bearer' + token)";
pub const UNPARSABLE_TOKEN: &str = "Unable to parse token";
pub const USER_NOT_FOUND: &str = "Token's user not found (it may have been deleted)";
pub const LOOKUP_FAILED: &str = "Invalid token. User may have been deleted";

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. It wraps the user record
/// freshly fetched from the repository, never the copy embedded in the token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Splits `Bearer <token>` into its token, requiring exactly two space-separated parts.
fn bearer_token(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait so that `AuthUser` can guard a whole
/// router (see `auth_middleware`) or be taken directly as a handler argument.
///
/// The pipeline is linear and every failure is terminal:
/// 1. Header presence.
/// 2. `Bearer <token>` shape.
/// 3. Signature and expiry verification via the `TokenCodec`.
/// 4. Repository lookup of the claimed user.
/// 5. Field-for-field comparison of the stored user with the claim, which
///    rejects tokens issued before the user was last modified.
///
/// Rejection: `ApiError` with status 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized(MISSING_HEADER))?;

        let token = auth_header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::unauthorized(MALFORMED_HEADER))?;

        let claims = tokens.decode(token).map_err(|e| {
            tracing::warn!("rejecting token: {e}");
            ApiError::unauthorized(UNPARSABLE_TOKEN)
        })?;

        let user = match repo.get_user(claims.user.sub).await {
            Ok(user) => user,
            Err(RepoError::NotFound) => return Err(ApiError::unauthorized(USER_NOT_FOUND)),
            Err(e) => {
                tracing::error!(user_id = claims.user.sub, "token user lookup failed: {e}");
                return Err(ApiError::unauthorized(LOOKUP_FAILED));
            }
        };

        if !claims.user.matches(&user) {
            tracing::warn!(user_id = user.id, "token is stale for its user");
            return Err(ApiError::unauthorized(USER_NOT_FOUND));
        }

        Ok(AuthUser(user))
    }
}
