use axum::{
    extract::{Path, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::LinkError;
use crate::links::LinkService;

pub struct RedirectState {
    pub links: Arc<LinkService>,
}

/// Primary tag of an Accept-Language header, e.g. "en-US" from
/// "en-US,en;q=0.9". Absent or empty headers yield `None` so the event
/// lands in the unknown-language bucket.
fn primary_language(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(ACCEPT_LANGUAGE)?.to_str().ok()?;
    let tag = raw.split(',').next()?.split(';').next()?.trim();
    if tag.is_empty() || tag == "*" {
        return None;
    }
    Some(tag.to_string())
}

/// Redirect a slug to its destination, recording a click.
pub async fn redirect_link(
    State(state): State<Arc<RedirectState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match state.links.resolve(&slug).await {
        Ok(link) => {
            let lang = primary_language(&headers);
            if let Err(err) = state.links.record_click(link.id, lang.as_deref()).await {
                tracing::warn!(slug = %slug, error = %err, "failed to record click");
            }
            // Temporary: destinations are mutable, a 308/301 would pin them
            // in browser caches.
            Redirect::temporary(&link.destination).into_response()
        }
        Err(LinkError::NotFound) => (StatusCode::NOT_FOUND, "Short link not found").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn primary_language_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        assert_eq!(primary_language(&headers), Some("en-US".to_string()));

        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("de;q=0.8"));
        assert_eq!(primary_language(&headers), Some("de".to_string()));

        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("*"));
        assert_eq!(primary_language(&headers), None);

        headers.remove(ACCEPT_LANGUAGE);
        assert_eq!(primary_language(&headers), None);
    }
}
