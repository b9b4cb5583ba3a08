use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

use crate::repository::RepoError;
use crate::validation::{FieldViolation, ValidationErrors};

/// ApiError
///
/// The single error type surfaced at the HTTP boundary. Every handler and
/// extractor returns it, so each failure path ends up as a status code plus
/// a message (and, for validation failures, the offending fields).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<FieldViolation>,
}

/// ErrorBody
///
/// JSON representation of an `ApiError`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldViolation>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.message);
        } else {
            tracing::debug!(status = %self.status, "{}", self.message);
        }
        let body = ErrorBody {
            message: self.message,
            status: self.status.as_u16(),
            errors: self.errors,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    /// Validation failures list the offending fields but never echo the submitted object.
    fn from(errors: ValidationErrors) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Validation failed".to_string(),
            errors: errors.into_violations(),
        }
    }
}

// --- Error Normalizer ---

/// Entity
///
/// The kind of record a repository call was addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Post,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => f.write_str("user"),
            Entity::Post => f.write_str("post"),
        }
    }
}

/// ErrorContext
///
/// What the caller was attempting when the repository failed. Used to turn a
/// generic store failure into a message that names the concrete entity, id or username.
#[derive(Debug, Clone, Copy)]
pub struct ErrorContext<'a> {
    pub entity: Entity,
    pub id: Option<i32>,
    pub username: Option<&'a str>,
}

impl<'a> ErrorContext<'a> {
    pub fn user(id: Option<i32>) -> Self {
        Self {
            entity: Entity::User,
            id,
            username: None,
        }
    }

    pub fn post(id: Option<i32>) -> Self {
        Self {
            entity: Entity::Post,
            id,
            username: None,
        }
    }

    pub fn with_username(mut self, username: &'a str) -> Self {
        self.username = Some(username);
        self
    }
}

/// Builds the 404 message for an id that does not resolve to a record.
pub fn not_found_message(entity: Entity, id: Option<i32>) -> String {
    match id {
        Some(id) => format!("Cannot find {entity} by the given id: {id}"),
        None => format!("Cannot find {entity} by the given id"),
    }
}

/// normalize
///
/// Reclassifies a repository failure:
/// - `NotFound` always becomes a 404 naming the entity kind and attempted id.
/// - A uniqueness violation on `username` keeps `status` and reports the taken username.
/// - Everything else keeps `status` and the original message.
pub fn normalize(err: RepoError, status: StatusCode, ctx: ErrorContext<'_>) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found(not_found_message(ctx.entity, ctx.id)),
        RepoError::UniqueViolation { field } if field == "username" => ApiError::new(
            status,
            format!("Username {} already taken", ctx.username.unwrap_or_default()),
        ),
        other => ApiError::new(status, other.to_string()),
    }
}
