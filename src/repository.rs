use crate::models::{Post, PostChanges, User, UserChanges};
use crate::pagination::Page;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// RepoError
///
/// Typed failure taxonomy at the persistence boundary. Handlers never inspect
/// driver error strings; they only see these variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepoError {
    /// The addressed row does not exist.
    #[error("entity not found")]
    NotFound,
    /// A uniqueness constraint on `field` rejected the write.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: String },
    /// Any other store failure, carrying the driver's message.
    #[error("{0}")]
    Other(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::UniqueViolation {
                field: db
                    .constraint()
                    .map(constraint_field)
                    .unwrap_or("unknown")
                    .to_string(),
            },
            // The only foreign key is posts.user_id, so a violation means the owner is gone.
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
            _ => {
                tracing::error!("repository error: {:?}", err);
                RepoError::Other(err.to_string())
            }
        }
    }
}

/// Maps a Postgres constraint name such as `users_username_key` to its column (`username`).
fn constraint_field(constraint: &str) -> &str {
    let trimmed = constraint.strip_suffix("_key").unwrap_or(constraint);
    trimmed
        .split_once('_')
        .map(|(_table, column)| column)
        .unwrap_or(trimmed)
}

/// Listing
///
/// One page of a collection together with the size of the whole collection,
/// which the HAL layer needs to build `last`/`next` links.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers and the auth
/// guard only depend on this trait, so tests can swap in `InMemoryRepository`.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self, page: Page) -> RepoResult<Listing<User>>;
    // Fails with `RepoError::NotFound` when the id is unknown.
    async fn get_user(&self, id: i32) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: UserChanges) -> RepoResult<User>;
    // Full replacement; bumps `updated_at`.
    async fn update_user(&self, id: i32, user: UserChanges) -> RepoResult<User>;
    // Cascades to the user's posts.
    async fn delete_user(&self, id: i32) -> RepoResult<()>;

    // --- Posts ---
    async fn list_posts(&self, page: Page) -> RepoResult<Listing<Post>>;
    async fn list_user_posts(&self, user_id: i32, page: Page) -> RepoResult<Listing<Post>>;
    async fn get_post(&self, id: i32) -> RepoResult<Post>;
    async fn create_post(&self, user_id: i32, post: PostChanges) -> RepoResult<Post>;
    async fn update_post(&self, id: i32, post: PostChanges) -> RepoResult<Post>;
    async fn delete_post(&self, id: i32) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// list_users
    ///
    /// `LIMIT NULL` is used when the page size is 0, which Postgres treats as "no limit".
    async fn list_users(&self, page: Page) -> RepoResult<Listing<User>> {
        let items = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password, first_name, last_name, age, created_at, updated_at
               FROM users ORDER BY id OFFSET $1 LIMIT $2"#,
        )
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(Listing { items, total })
    }

    async fn get_user(&self, id: i32) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password, first_name, last_name, age, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password, first_name, last_name, age, created_at, updated_at
               FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: UserChanges) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (username, password, first_name, last_name, age)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, username, password, first_name, last_name, age, created_at, updated_at"#,
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.age)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_user
    ///
    /// `clock_timestamp()` rather than `NOW()` so two updates inside one
    /// transaction still produce distinct `updated_at` values.
    async fn update_user(&self, id: i32, user: UserChanges) -> RepoResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET username = $2, password = $3, first_name = $4, last_name = $5, age = $6,
                   updated_at = clock_timestamp()
               WHERE id = $1
               RETURNING id, username, password, first_name, last_name, age, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.age)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_user(&self, id: i32) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        match result.rows_affected() {
            0 => Err(RepoError::NotFound),
            _ => Ok(()),
        }
    }

    async fn list_posts(&self, page: Page) -> RepoResult<Listing<Post>> {
        let items = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, user_id, created_at, updated_at
               FROM posts ORDER BY id OFFSET $1 LIMIT $2"#,
        )
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(Listing { items, total })
    }

    async fn list_user_posts(&self, user_id: i32, page: Page) -> RepoResult<Listing<Post>> {
        let items = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, user_id, created_at, updated_at
               FROM posts WHERE user_id = $1 ORDER BY id OFFSET $2 LIMIT $3"#,
        )
        .bind(user_id)
        .bind(page.offset())
        .bind(page.limit())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Listing { items, total })
    }

    async fn get_post(&self, id: i32) -> RepoResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"SELECT id, title, content, user_id, created_at, updated_at
               FROM posts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, user_id: i32, post: PostChanges) -> RepoResult<Post> {
        let created = sqlx::query_as::<_, Post>(
            r#"INSERT INTO posts (title, content, user_id) VALUES ($1, $2, $3)
               RETURNING id, title, content, user_id, created_at, updated_at"#,
        )
        .bind(post.title)
        .bind(post.content)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_post(&self, id: i32, post: PostChanges) -> RepoResult<Post> {
        let updated = sqlx::query_as::<_, Post>(
            r#"UPDATE posts SET title = $2, content = $3, updated_at = clock_timestamp()
               WHERE id = $1
               RETURNING id, title, content, user_id, created_at, updated_at"#,
        )
        .bind(id)
        .bind(post.title)
        .bind(post.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_post(&self, id: i32) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        match result.rows_affected() {
            0 => Err(RepoError::NotFound),
            _ => Ok(()),
        }
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryTables {
    users: BTreeMap<i32, User>,
    posts: BTreeMap<i32, Post>,
    last_user_id: i32,
    last_post_id: i32,
}

/// InMemoryRepository
///
/// A process-local `Repository` with the same observable semantics as the
/// Postgres implementation (unique usernames, cascading deletes, ordered ids).
/// Used by the test suites and handy for running the API without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<MemoryTables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns a timestamp strictly after `previous`, so every write is observable.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn username_taken(tables: &MemoryTables, username: &str, except: Option<i32>) -> bool {
    tables
        .users
        .values()
        .any(|u| u.username == username && Some(u.id) != except)
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_users(&self, page: Page) -> RepoResult<Listing<User>> {
        let tables = self.tables.read().await;
        Ok(Listing {
            items: page.slice(tables.users.values().cloned()),
            total: tables.users.len() as i64,
        })
    }

    async fn get_user(&self, id: i32) -> RepoResult<User> {
        let tables = self.tables.read().await;
        tables.users.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: UserChanges) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if username_taken(&tables, &user.username, None) {
            return Err(RepoError::UniqueViolation {
                field: "username".to_string(),
            });
        }
        tables.last_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.last_user_id,
            username: user.username,
            password: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i32, user: UserChanges) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if username_taken(&tables, &user.username, Some(id)) {
            return Err(RepoError::UniqueViolation {
                field: "username".to_string(),
            });
        }
        let existing = tables.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        existing.username = user.username;
        existing.password = user.password_hash;
        existing.first_name = user.first_name;
        existing.last_name = user.last_name;
        existing.age = user.age;
        existing.updated_at = next_timestamp(existing.updated_at);
        Ok(existing.clone())
    }

    async fn delete_user(&self, id: i32) -> RepoResult<()> {
        let mut tables = self.tables.write().await;
        tables.users.remove(&id).ok_or(RepoError::NotFound)?;
        tables.posts.retain(|_, post| post.user_id != id);
        Ok(())
    }

    async fn list_posts(&self, page: Page) -> RepoResult<Listing<Post>> {
        let tables = self.tables.read().await;
        Ok(Listing {
            items: page.slice(tables.posts.values().cloned()),
            total: tables.posts.len() as i64,
        })
    }

    async fn list_user_posts(&self, user_id: i32, page: Page) -> RepoResult<Listing<Post>> {
        let tables = self.tables.read().await;
        let owned: Vec<Post> = tables
            .posts
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        let total = owned.len() as i64;
        Ok(Listing {
            items: page.slice(owned),
            total,
        })
    }

    async fn get_post(&self, id: i32) -> RepoResult<Post> {
        let tables = self.tables.read().await;
        tables.posts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_post(&self, user_id: i32, post: PostChanges) -> RepoResult<Post> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(RepoError::NotFound);
        }
        tables.last_post_id += 1;
        let now = Utc::now();
        let created = Post {
            id: tables.last_post_id,
            title: post.title,
            content: post.content,
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: i32, post: PostChanges) -> RepoResult<Post> {
        let mut tables = self.tables.write().await;
        let existing = tables.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        existing.title = post.title;
        existing.content = post.content;
        existing.updated_at = next_timestamp(existing.updated_at);
        Ok(existing.clone())
    }

    async fn delete_post(&self, id: i32) -> RepoResult<()> {
        let mut tables = self.tables.write().await;
        tables.posts.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}
