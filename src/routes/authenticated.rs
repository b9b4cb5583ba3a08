use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth_middleware` (applied in `create_router`),
/// so handlers can rely on an `AuthUser` being present in the request extensions.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Users ---
        // GET /users?start=&size=
        .route("/users", get(handlers::list_users))
        // GET/PUT/DELETE /users/{id}
        .route(
            "/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Posts scoped by owner ---
        // GET /users/{id}/posts?start=&size=, POST /users/{id}/posts
        .route(
            "/users/{id}/posts",
            get(handlers::list_user_posts).post(handlers::create_user_post),
        )
        // GET/PUT/DELETE /users/{id}/posts/{post_id}
        // The post must belong to the user in the path.
        .route(
            "/users/{id}/posts/{post_id}",
            get(handlers::get_user_post)
                .put(handlers::update_user_post)
                .delete(handlers::delete_user_post),
        )
        // --- Posts ---
        // GET /posts?start=&size=
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        .route("/posts/{id}", get(handlers::get_post))
}
