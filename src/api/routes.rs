use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{
    add_blacklist_entry, create_link, delete_link, get_language_stats, get_link, get_stats,
    health_check, list_blacklist, list_links, remove_blacklist_entry, update_link, AppState,
};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/links", post(create_link))
        .route("/links", get(list_links))
        .route("/links/{slug}", get(get_link))
        .route("/links/{slug}", put(update_link))
        .route("/links/{slug}", delete(delete_link))
        .route("/links/{slug}/stats", get(get_stats))
        .route("/links/{slug}/languages", get(get_language_stats))
        .route("/blacklist", get(list_blacklist))
        .route("/blacklist", post(add_blacklist_entry))
        .route("/blacklist/{host}", delete(remove_blacklist_entry))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
