use crate::{AppState, handlers};
use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Sends browsers to the interactive API documentation.
        .route("/", get(|| async { Redirect::permanent("/swagger-ui") }))
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // Exchanges credentials for a token.
        .route("/login", post(handlers::login))
        // POST /register
        // Creates a user; responds 201 with a Location header.
        .route("/register", post(handlers::register_user))
}
