pub mod auth;
pub mod avatar;
pub mod config;
pub mod db;
pub mod notifications;
pub mod validation;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    delete_avatar_handler, delete_me_handler, get_avatar_handler, login_handler, logout_all_handler,
    logout_handler, me_handler, register_handler, require_auth, update_me_handler, upload_avatar_handler,
    AuthService, PgUserStore, TokenService, UserStore,
};
use avatar::MAX_AVATAR_BYTES;
use config::AppConfig;
use notifications::{LogNotifier, Notifications};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register_handler,
        auth::handlers::login_handler,
        auth::handlers::logout_handler,
        auth::handlers::logout_all_handler,
        auth::handlers::me_handler,
        auth::handlers::update_me_handler,
        auth::handlers::delete_me_handler,
        auth::handlers::upload_avatar_handler,
        auth::handlers::delete_avatar_handler,
        auth::handlers::get_avatar_handler,
    ),
    components(
        schemas(
            auth::models::RegisterRequest,
            auth::models::LoginRequest,
            auth::models::UserPatch,
            auth::models::UserResponse,
            auth::models::AuthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "Accounts, sessions and avatars")
    ),
    info(
        title = "Notekeeper API",
        version = "1.0.0",
        description = "User accounts and bearer-token sessions for Notekeeper",
        contact(
            name = "API Support",
            email = "support@notekeeper.app"
        )
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
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

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wire the auth service over a store using the process configuration
    pub fn new(store: Arc<dyn UserStore>, config: &AppConfig) -> Self {
        let tokens = TokenService::with_duration(config.jwt_secret.clone(), config.token_ttl_secs);
        let notifications = Notifications::new(Arc::new(LogNotifier), config.mail_from.clone());

        Self {
            auth: Arc::new(AuthService::new(store, tokens, notifications)),
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.auth)
    }
}

/// Handler for GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Creates and configures the application router
///
/// Everything under `protected` passes through `require_auth` first.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/users/logout", post(logout_handler))
        .route("/users/logoutall", post(logout_all_handler))
        .route("/users/logoutAll", post(logout_all_handler))
        .route(
            "/users/me",
            get(me_handler).patch(update_me_handler).delete(delete_me_handler),
        )
        .route(
            "/users/me/avatar",
            post(upload_avatar_handler)
                .delete(delete_avatar_handler)
                // Oversized bodies must reach the handler to get a readable 400
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES * 2)),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/users", post(register_handler))
        .route("/users/login", post(login_handler))
        .route("/users/:id/avatar", get(get_avatar_handler))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Notekeeper API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");
    tracing::debug!("Loaded {:?}", config);

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to create database pool");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let state = AppState::new(Arc::new(PgUserStore::new(db_pool)), &config);
    let app = create_router(state);

    let addr = config.bind_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Notekeeper API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
