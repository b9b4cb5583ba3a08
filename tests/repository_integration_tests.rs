use mini_wallfer::{
    config::BCRYPT_MIN_COST,
    models::{PostChanges, User, UserChanges},
    pagination::Page,
    repository::{PostgresRepository, RepoError, Repository},
};
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::test;

// These tests need a disposable Postgres database:
//   DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored

// --- Test Context and Setup ---

/// A simple structure to hold the database pool for testing
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// A username no other test run has used, so tests can share one database.
fn unique_username(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{prefix}_{nanos}_{}", SEQUENCE.fetch_add(1, Ordering::SeqCst))
}

fn user_changes(username: &str) -> UserChanges {
    UserChanges {
        username: username.to_string(),
        password_hash: bcrypt::hash("secret1", BCRYPT_MIN_COST).unwrap(),
        first_name: Some("Test".to_string()),
        last_name: None,
        age: Some(20),
    }
}

async fn create_test_user(repo: &PostgresRepository, prefix: &str) -> User {
    repo.create_user(user_changes(&unique_username(prefix)))
        .await
        .expect("Failed to insert test user")
}

fn post_changes(title: &str) -> PostChanges {
    PostChanges {
        title: title.to_string(),
        content: "content".to_string(),
    }
}

// --- Tests ---

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_get_user() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let created = create_test_user(&repo, "get").await;

    let fetched = repo.get_user(created.id).await.unwrap();
    assert_eq!(fetched, created);

    let by_name = repo.find_user_by_username(&created.username).await.unwrap();
    assert_eq!(by_name.map(|u| u.id), Some(created.id));
    assert!(repo.find_user_by_username("no_such_user_here").await.unwrap().is_none());
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_ids_are_not_found() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    assert_eq!(repo.get_user(-1).await, Err(RepoError::NotFound));
    assert_eq!(
        repo.update_user(-1, user_changes("ghost_user")).await,
        Err(RepoError::NotFound)
    );
    assert_eq!(repo.delete_user(-1).await, Err(RepoError::NotFound));
    assert_eq!(repo.get_post(-1).await, Err(RepoError::NotFound));
    assert_eq!(repo.delete_post(-1).await, Err(RepoError::NotFound));
    assert_eq!(
        repo.create_post(-1, post_changes("orphan")).await,
        Err(RepoError::NotFound)
    );
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_username_is_unique_violation() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let existing = create_test_user(&repo, "dup").await;

    let result = repo.create_user(user_changes(&existing.username)).await;

    assert_eq!(
        result,
        Err(RepoError::UniqueViolation {
            field: "username".to_string()
        })
    );
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_bumps_updated_at() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let created = create_test_user(&repo, "upd").await;

    let mut changes = user_changes(&created.username);
    changes.age = None;
    let updated = repo.update_user(created.id, changes).await.unwrap();

    assert_eq!(updated.age, None);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
}

#[test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_posts_pagination_and_cascade() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&repo, "posts").await;

    for title in ["one", "two", "three"] {
        repo.create_post(owner.id, post_changes(title)).await.unwrap();
    }

    let page = repo.list_user_posts(owner.id, Page::new(1, 1)).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "two");

    let all = repo.list_user_posts(owner.id, Page::new(0, 0)).await.unwrap();
    assert_eq!(all.items.len(), 3);

    let post = all.items[0].clone();
    let edited = repo.update_post(post.id, post_changes("edited")).await.unwrap();
    assert_eq!(edited.title, "edited");
    assert!(edited.updated_at > post.updated_at);

    repo.delete_user(owner.id).await.unwrap();
    for post in all.items {
        assert_eq!(repo.get_post(post.id).await, Err(RepoError::NotFound));
    }
}
