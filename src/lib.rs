use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod hal;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod token;
pub mod validation;

// Routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use token::{TokenCodec, TokenState};

/// ApiDoc
///
/// Auto-generates the OpenAPI document from the `#[utoipa::path]` handlers and
/// `#[derive(ToSchema)]` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mini Wallfer",
        description = "Minimalistic implementation of the Wallfer platform for colleges"
    ),
    paths(
        handlers::login, handlers::register_user,
        handlers::list_users, handlers::get_user, handlers::update_user, handlers::delete_user,
        handlers::list_user_posts, handlers::create_user_post, handlers::get_user_post,
        handlers::update_user_post, handlers::delete_user_post,
        handlers::list_posts, handlers::get_post
    ),
    components(
        schemas(
            models::User, models::Post, models::UserPayload, models::PostPayload,
            models::LoginRequest, models::TokenResponse,
            error::ErrorBody, validation::FieldViolation,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login and registration"),
        (name = "Users", description = "User management"),
        (name = "Posts", description = "Posts owned by users")
    )
)]
pub struct ApiDoc;

/// Registers the `jwt` bearer scheme referenced by `security(("jwt" = []))`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, immutable container holding every service a request may need.
/// Cloned per request; all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: the persistence trait object (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Token Codec: signs and verifies tokens with the configured secret.
    pub tokens: TokenState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state, deriving the token codec from the configuration's secret and TTL.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let tokens = std::sync::Arc::new(TokenCodec::new(&config.jwt_secret, config.token_ttl_secs));
        Self {
            repo,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenState {
    fn from_ref(app_state: &AppState) -> TokenState {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the `authenticated_routes`. Extracting `AuthUser`
/// runs the whole token pipeline; on failure the extractor's 401 is returned and
/// the handler never runs. On success the user is stored in the request extensions.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
