use crate::{
    models::User,
    repository::{RepoError, Repository},
};

/// CredentialError
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Unknown username and wrong password both map here.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Repository(#[from] RepoError),
    #[error("password verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// verify
///
/// Checks a username/password pair against the stored bcrypt hash.
///
/// Returns the full `User` on success. A missing user, a mismatched password and
/// an unreadable stored hash all produce `CredentialError::InvalidCredentials`.
/// The bcrypt comparison runs on the blocking pool, like hashing does.
pub async fn verify(
    repo: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<User, CredentialError> {
    let Some(user) = repo.find_user_by_username(username).await? else {
        tracing::debug!("login rejected: unknown username");
        return Err(CredentialError::InvalidCredentials);
    };

    // bcrypt::verify compares the derived hash in constant time.
    let candidate = password.to_owned();
    let stored = user.password.clone();
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &stored)).await?;

    match outcome {
        Ok(true) => Ok(user),
        Ok(false) => {
            tracing::debug!(user_id = user.id, "login rejected: password mismatch");
            Err(CredentialError::InvalidCredentials)
        }
        Err(e) => {
            tracing::warn!(user_id = user.id, "stored password hash unreadable: {e}");
            Err(CredentialError::InvalidCredentials)
        }
    }
}

/// hash_password
///
/// Hashes a plaintext password with the configured bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}
