use mini_wallfer::{
    config::BCRYPT_MIN_COST,
    InMemoryRepository,
    credentials::{self, CredentialError},
    models::UserChanges,
    repository::Repository,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

async fn repo_with(username: &str, password_hash: String) -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.create_user(UserChanges {
        username: username.to_string(),
        password_hash,
        first_name: None,
        last_name: None,
        age: None,
    })
    .await
    .unwrap();
    repo
}

#[tokio::test]
async fn test_verify_accepts_matching_password() {
    let hash = credentials::hash_password("secret1", BCRYPT_MIN_COST).unwrap();
    let repo = repo_with("alice", hash).await;

    let user = credentials::verify(&repo, "alice", "secret1").await.unwrap();

    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn test_verify_rejects_wrong_password_and_unknown_user_alike() {
    let hash = credentials::hash_password("secret1", BCRYPT_MIN_COST).unwrap();
    let repo = repo_with("alice", hash).await;

    for (username, password) in [("alice", "secret2"), ("alice", ""), ("bob", "secret1")] {
        let result = credentials::verify(&repo, username, password).await;
        assert!(
            matches!(result, Err(CredentialError::InvalidCredentials)),
            "{username}/{password}"
        );
    }
}

#[tokio::test]
async fn test_verify_treats_corrupt_hash_as_invalid_credentials() {
    let repo = repo_with("alice", "plaintext-not-a-hash".to_string()).await;

    let result = credentials::verify(&repo, "alice", "plaintext-not-a-hash").await;

    assert!(matches!(result, Err(CredentialError::InvalidCredentials)));
}

#[tokio::test(flavor = "current_thread")]
async fn test_verify_leaves_the_runtime_free() {
    let hash = credentials::hash_password("secret1", 10).unwrap();
    let repo = repo_with("alice", hash).await;

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = tokio::spawn({
        let ticks = ticks.clone();
        async move {
            loop {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    });

    // Only one worker thread: the ticker can only run if verify yields while bcrypt works.
    credentials::verify(&repo, "alice", "secret1").await.unwrap();
    ticker.abort();

    assert!(ticks.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_hash_password_is_salted() {
    let first = credentials::hash_password("secret1", BCRYPT_MIN_COST).unwrap();
    let second = credentials::hash_password("secret1", BCRYPT_MIN_COST).unwrap();

    assert_ne!(first, second);
    assert!(bcrypt::verify("secret1", &first).unwrap());
    assert!(bcrypt::verify("secret1", &second).unwrap());
}
