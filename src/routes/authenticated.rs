use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here receives a validated `AuthUser`. Row ownership is not checked by the
/// routing layer: the resource controllers scope every query to the caller.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /bookmarks/
        // Lists the visible set or creates a bookmark owned by the caller.
        .route(
            "/bookmarks/",
            get(handlers::list_bookmarks).post(handlers::create_bookmark),
        )
        // GET/PUT/DELETE /bookmarks/{id}/
        // Restricted to the caller's own bookmarks; anything else is 404.
        .route(
            "/bookmarks/{id}/",
            get(handlers::get_bookmark)
                .put(handlers::update_bookmark)
                .delete(handlers::delete_bookmark),
        )
        // GET/PUT/DELETE /users/{id}/
        // Restricted to the caller's own record, staff included.
        .route(
            "/users/{id}/",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}
