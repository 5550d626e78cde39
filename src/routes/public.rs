use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints open to anonymous clients: health, token issuance and the user collection.
/// `GET /users/` lives here because registration shares its path; the policy still
/// answers 401/403 for it.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api-token-auth/
        // Exchanges username/password for a JWT.
        .route("/api-token-auth/", post(handlers::obtain_token))
        // GET /users/ (staff only), POST /users/ (open registration)
        .route(
            "/users/",
            get(handlers::list_users).post(handlers::register_user),
        )
}
