use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{self, AppState};

/// Create the main application router with all API endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Session
        .route("/api/auth/sign-up", post(handlers::sign_up))
        .route("/api/auth/sign-in", post(handlers::sign_in))
        .route("/api/auth/role", post(handlers::select_role))
        .route("/api/auth/sign-out", post(handlers::sign_out))
        // Client self-service
        .route("/api/me/dashboard", get(handlers::my_dashboard))
        // Administration
        .route(
            "/api/clients",
            get(handlers::list_clients).post(handlers::create_client),
        )
        .route("/api/clients/:id", patch(handlers::update_client))
        .route("/api/clients/:id/email", put(handlers::update_client_email))
        .route("/api/clients/:id/dashboard", get(handlers::client_dashboard))
        .route(
            "/api/clients/:id/metrics/preview",
            post(handlers::preview_metrics),
        )
        .route("/api/clients/:id/metrics", post(handlers::create_metric))
        .route("/api/managers", get(handlers::list_managers))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
