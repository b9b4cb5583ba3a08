use crate::{
    AppState,
    auth::AuthUser,
    credentials::{self, CredentialError},
    error::{ApiError, Entity, ErrorBody, ErrorContext, normalize},
    hal::{Collection, Hal, Resource},
    models::{LoginRequest, Post, PostChanges, PostPayload, TokenResponse, User, UserChanges, UserPayload},
    pagination::{Page, PageQuery},
    validation::{PayloadFields, Validate, check_fields},
};
use axum::{
    Extension, Json,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, Uri, header, request::Parts},
    response::IntoResponse,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

// --- Helpers ---

/// IdPath
///
/// `Path` whose rejection (a non-numeric or out-of-range id) is reported with
/// the JSON error body instead of Axum's plain-text one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath<T>(pub T);

impl<S, T> FromRequestParts<S> for IdPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(IdPath(value))
    }
}

/// parse_payload
///
/// Turns a raw JSON body into a typed payload. Malformed JSON, non-object bodies,
/// empty objects and type mismatches all become 422s; the body itself is never echoed.
/// Wrongly typed or missing fields are named in the `errors` array.
fn parse_payload<T: DeserializeOwned + PayloadFields>(
    body: Result<Json<Value>, JsonRejection>,
    entity: Entity,
) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|rejection| ApiError::unprocessable(rejection.body_text()))?;
    match &value {
        Value::Object(map) if map.is_empty() => {
            return Err(ApiError::unprocessable(format!("Empty {entity} data")));
        }
        Value::Object(map) => check_fields::<T>(map)?,
        _ => {
            return Err(ApiError::unprocessable(format!(
                "The {entity} data must be a JSON object"
            )));
        }
    }
    serde_json::from_value(value).map_err(|e| ApiError::unprocessable(e.to_string()))
}

/// Builds an absolute `Location` from the request's `Host` header, falling back to the bare path.
fn location(headers: &HeaderMap, path: &str) -> String {
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path.to_string(),
    }
}

/// Validates a user payload and hashes its password off the async executor.
async fn user_changes(payload: UserPayload, cost: u32) -> Result<UserChanges, ApiError> {
    payload.validate()?;
    let UserPayload {
        username,
        password,
        first_name,
        last_name,
        age,
    } = payload;
    let password_hash =
        tokio::task::spawn_blocking(move || credentials::hash_password(&password, cost))
            .await
            .map_err(|e| ApiError::internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))?;
    Ok(UserChanges {
        username,
        password_hash,
        first_name,
        last_name,
        age,
    })
}

/// Resolves an existing user, reporting an unknown id as a 404 naming it.
async fn existing_user(state: &AppState, user_id: i32) -> Result<User, ApiError> {
    state
        .repo
        .get_user(user_id)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::user(Some(user_id))))
}

/// owned_post
///
/// Scoped lookup for `/users/{user_id}/posts/{post_id}`: the user must exist,
/// the post must exist, and the post's owner must be that user.
async fn owned_post(state: &AppState, user_id: i32, post_id: i32) -> Result<Post, ApiError> {
    existing_user(state, user_id).await?;
    let post = state
        .repo
        .get_post(post_id)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::post(Some(post_id))))?;
    if post.user_id != user_id {
        return Err(ApiError::not_found("This post doesn't belong to this user"));
    }
    Ok(post)
}

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges a username/password pair for a signed token.
///
/// *Security*: An unknown username and a wrong password produce the same 401,
/// so the endpoint cannot be used to discover existing accounts.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 422, description = "Missing username or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::unprocessable(rejection.body_text()))?;
    let (Some(username), Some(password)) = (request.username, request.password) else {
        return Err(ApiError::unprocessable("Username and password must be provided"));
    };
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::unprocessable("Username and password must be provided"));
    }

    let user = credentials::verify(state.repo.as_ref(), &username, &password)
        .await
        .map_err(|e| match e {
            CredentialError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            CredentialError::Repository(e) => ApiError::internal(e.to_string()),
            CredentialError::Task(e) => ApiError::internal(e.to_string()),
        })?;

    let token = state
        .tokens
        .issue(&user)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::info!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

/// register_user
///
/// [Public Route] Creates a new user. The password is bcrypt-hashed before it
/// reaches the repository.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Authentication",
    request_body = UserPayload,
    responses(
        (status = 201, description = "Registered", body = User, content_type = "application/hal+json",
            headers(("Location" = String, description = "URL of the new user"))),
        (status = 422, description = "Invalid, empty or duplicate user", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload: UserPayload = parse_payload(body, Entity::User)?;
    let username = payload.username.clone();
    let changes = user_changes(payload, state.config.bcrypt_cost).await?;

    let user = state.repo.create_user(changes).await.map_err(|e| {
        normalize(
            e,
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorContext::user(None).with_username(&username),
        )
    })?;

    tracing::info!(user_id = user.id, "user registered");
    let location = location(&headers, &format!("/users/{}", user.id));
    Ok((
        [(header::LOCATION, location)],
        Hal(StatusCode::CREATED, Resource::new(user)),
    ))
}

// --- Users ---

/// list_users
///
/// [Authenticated Route] Paginated list of users with navigation links.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = [User], content_type = "application/hal+json"),
        (status = 400, description = "List not paginated", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    uri: Uri,
    page: Page,
) -> Result<Hal<Collection<User>>, ApiError> {
    let listing = state
        .repo
        .list_users(page)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::user(None)))?;
    Ok(Hal(
        StatusCode::OK,
        Collection::new(listing.items, listing.total, uri.path(), page),
    ))
}

/// get_user
///
/// [Authenticated Route] A single user with its action links.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = User, content_type = "application/hal+json"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Hal<Resource<User>>, ApiError> {
    let user = existing_user(&state, id).await?;
    Ok(Hal(StatusCode::OK, Resource::new(user)))
}

/// update_user
///
/// [Authenticated Route] Full replacement of a user's fields.
///
/// *Note*: Any update changes the user's `updated_at`, which invalidates every
/// token previously issued for that user (including the caller's own, if they
/// update themselves).
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated", body = User, content_type = "application/hal+json"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody),
        (status = 422, description = "Invalid, empty or duplicate user", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    IdPath(id): IdPath<i32>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Hal<Resource<User>>, ApiError> {
    let payload: UserPayload = parse_payload(body, Entity::User)?;
    let username = payload.username.clone();
    let changes = user_changes(payload, state.config.bcrypt_cost).await?;

    let user = state.repo.update_user(id, changes).await.map_err(|e| {
        normalize(
            e,
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorContext::user(Some(id)).with_username(&username),
        )
    })?;

    tracing::info!(actor_id = actor.id, user_id = id, "user updated");
    Ok(Hal(StatusCode::OK, Resource::new(user)))
}

/// delete_user
///
/// [Authenticated Route] Removes a user together with their posts.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    IdPath(id): IdPath<i32>,
) -> Result<StatusCode, ApiError> {
    state
        .repo
        .delete_user(id)
        .await
        .map_err(|e| normalize(e, StatusCode::NOT_FOUND, ErrorContext::user(Some(id))))?;
    tracing::info!(actor_id = actor.id, user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Posts scoped by user ---

/// list_user_posts
///
/// [Authenticated Route] Paginated posts owned by one user.
#[utoipa::path(
    get,
    path = "/users/{id}/posts",
    tag = "Posts",
    params(("id" = i32, Path, description = "User ID"), PageQuery),
    responses(
        (status = 200, description = "Page of posts", body = [Post], content_type = "application/hal+json"),
        (status = 400, description = "List not paginated", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn list_user_posts(
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
    uri: Uri,
    page: Page,
) -> Result<Hal<Collection<Post>>, ApiError> {
    existing_user(&state, id).await?;
    let listing = state
        .repo
        .list_user_posts(id, page)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::user(Some(id))))?;
    Ok(Hal(
        StatusCode::OK,
        Collection::new(listing.items, listing.total, uri.path(), page),
    ))
}

/// create_user_post
///
/// [Authenticated Route] Adds a post owned by the user in the path.
#[utoipa::path(
    post,
    path = "/users/{id}/posts",
    tag = "Posts",
    params(("id" = i32, Path, description = "User ID")),
    request_body = PostPayload,
    responses(
        (status = 201, description = "Created", body = Post, content_type = "application/hal+json",
            headers(("Location" = String, description = "URL of the new post"))),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody),
        (status = 422, description = "Invalid or empty post", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn create_user_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    IdPath(id): IdPath<i32>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload: PostPayload = parse_payload(body, Entity::Post)?;
    payload.validate()?;
    existing_user(&state, id).await?;

    let post = state
        .repo
        .create_post(id, PostChanges::from(payload))
        .await
        .map_err(|e| normalize(e, StatusCode::UNPROCESSABLE_ENTITY, ErrorContext::user(Some(id))))?;

    tracing::info!(user_id = id, post_id = post.id, "post created");
    let location = location(&headers, &format!("/users/{}/posts/{}", id, post.id));
    Ok((
        [(header::LOCATION, location)],
        Hal(StatusCode::CREATED, Resource::new(post)),
    ))
}

/// get_user_post
///
/// [Authenticated Route] A post, only if it belongs to the user in the path.
#[utoipa::path(
    get,
    path = "/users/{id}/posts/{post_id}",
    tag = "Posts",
    params(
        ("id" = i32, Path, description = "User's ID"),
        ("post_id" = i32, Path, description = "Post's ID")
    ),
    responses(
        (status = 200, description = "Found", body = Post, content_type = "application/hal+json"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found or owned by another user", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn get_user_post(
    State(state): State<AppState>,
    IdPath((user_id, post_id)): IdPath<(i32, i32)>,
) -> Result<Hal<Resource<Post>>, ApiError> {
    let post = owned_post(&state, user_id, post_id).await?;
    Ok(Hal(StatusCode::OK, Resource::new(post)))
}

/// update_user_post
///
/// [Authenticated Route] Full replacement of a post owned by the user in the path.
#[utoipa::path(
    put,
    path = "/users/{id}/posts/{post_id}",
    tag = "Posts",
    params(
        ("id" = i32, Path, description = "User's ID"),
        ("post_id" = i32, Path, description = "Post's ID")
    ),
    request_body = PostPayload,
    responses(
        (status = 200, description = "Updated", body = Post, content_type = "application/hal+json"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found or owned by another user", body = ErrorBody),
        (status = 422, description = "Invalid or empty post", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn update_user_post(
    State(state): State<AppState>,
    IdPath((user_id, post_id)): IdPath<(i32, i32)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Hal<Resource<Post>>, ApiError> {
    let payload: PostPayload = parse_payload(body, Entity::Post)?;
    payload.validate()?;
    owned_post(&state, user_id, post_id).await?;

    let post = state
        .repo
        .update_post(post_id, PostChanges::from(payload))
        .await
        .map_err(|e| normalize(e, StatusCode::UNPROCESSABLE_ENTITY, ErrorContext::post(Some(post_id))))?;
    Ok(Hal(StatusCode::OK, Resource::new(post)))
}

/// delete_user_post
///
/// [Authenticated Route] Removes a post owned by the user in the path.
#[utoipa::path(
    delete,
    path = "/users/{id}/posts/{post_id}",
    tag = "Posts",
    params(
        ("id" = i32, Path, description = "User's ID"),
        ("post_id" = i32, Path, description = "Post's ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found or owned by another user", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn delete_user_post(
    State(state): State<AppState>,
    IdPath((user_id, post_id)): IdPath<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    owned_post(&state, user_id, post_id).await?;
    state
        .repo
        .delete_post(post_id)
        .await
        .map_err(|e| normalize(e, StatusCode::NOT_FOUND, ErrorContext::post(Some(post_id))))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Posts ---

/// list_posts
///
/// [Authenticated Route] Paginated list of every post.
#[utoipa::path(
    get,
    path = "/posts",
    tag = "Posts",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of posts", body = [Post], content_type = "application/hal+json"),
        (status = 400, description = "List not paginated", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    uri: Uri,
    page: Page,
) -> Result<Hal<Collection<Post>>, ApiError> {
    let listing = state
        .repo
        .list_posts(page)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::post(None)))?;
    Ok(Hal(
        StatusCode::OK,
        Collection::new(listing.items, listing.total, uri.path(), page),
    ))
}

/// get_post
///
/// [Authenticated Route] A single post by id, regardless of owner.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    tag = "Posts",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post, content_type = "application/hal+json"),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Entity not found", body = ErrorBody)
    ),
    security(("jwt" = []))
)]
pub async fn get_post(
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Hal<Resource<Post>>, ApiError> {
    let post = state
        .repo
        .get_post(id)
        .await
        .map_err(|e| normalize(e, StatusCode::INTERNAL_SERVER_ERROR, ErrorContext::post(Some(id))))?;
    Ok(Hal(StatusCode::OK, Resource::new(post)))
}
