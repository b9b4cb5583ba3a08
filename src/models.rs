use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table.
/// The password column only ever holds a bcrypt hash and is never serialized,
/// so a `User` can be rendered directly into response bodies.
#[derive(Debug, Clone, PartialEq, Serialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: i32,
    // Unique across all users (enforced by the `users_username_key` constraint).
    pub username: String,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Bumped by the store on every write; part of the token claim.
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Post
///
/// A post from the `posts` table. Every post is owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    // FK to users.id (Owner).
    pub user_id: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// UserPayload
///
/// Body of `POST /register` and `PUT /users/{id}`. Updates are full replacements,
/// so the same shape (including the password) is required for both.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserPayload {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "secret1")]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
}

/// PostPayload
///
/// Body of `POST /users/{id}/posts` and `PUT /users/{id}/posts/{post_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPayload {
    #[schema(example = "Hello")]
    pub title: String,
    #[schema(example = "First post on the wall")]
    pub content: String,
}

/// LoginRequest
///
/// Body of `POST /login`. Both fields are optional at the type level so a missing
/// field can be reported as a 422 instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// TokenResponse
///
/// Output of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

// --- Repository Inputs ---

/// UserChanges
///
/// A validated user payload whose password has already been hashed.
/// This is the only form in which user data reaches the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct UserChanges {
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
}

/// PostChanges
///
/// A validated post payload ready for insertion or full replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
}

impl From<PostPayload> for PostChanges {
    fn from(payload: PostPayload) -> Self {
        Self {
            title: payload.title.trim().to_string(),
            content: payload.content,
        }
    }
}
