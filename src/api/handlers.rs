use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blacklist::BlacklistService;
use crate::error::LinkError;
use crate::links::LinkService;
use crate::models::{permissions, CreateLinkRequest, Link, Principal, UpdateLinkRequest};
use crate::stats::{Granularity, LanguageCount, StatPoint, StatsService};

pub struct AppState {
    pub links: Arc<LinkService>,
    pub stats: Arc<StatsService>,
    pub blacklist: Arc<BlacklistService>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn into_api_error(err: LinkError) -> ApiError {
    let status = match &err {
        LinkError::Validation(_) => StatusCode::BAD_REQUEST,
        LinkError::Forbidden(_) => StatusCode::FORBIDDEN,
        LinkError::Conflict => StatusCode::CONFLICT,
        LinkError::NotFound => StatusCode::NOT_FOUND,
        LinkError::Storage(e) => {
            tracing::error!("storage failure: {e:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            );
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    tracing::error!("storage failure: {err:#}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
}

/// Create a new link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let link = state
        .links
        .create(&principal, payload)
        .await
        .map_err(into_api_error)?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// List links the principal may manage
pub async fn list_links(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<Link>>, ApiError> {
    let links = state
        .links
        .list(&principal)
        .await
        .map_err(into_api_error)?;
    Ok(Json(links))
}

/// Get one link by slug
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(slug): Path<String>,
) -> Result<Json<Link>, ApiError> {
    let link = state
        .links
        .get(&principal, &slug)
        .await
        .map_err(into_api_error)?;
    Ok(Json(link))
}

/// Partially update a link
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<Link>, ApiError> {
    let link = state
        .links
        .update(&principal, &slug, payload)
        .await
        .map_err(into_api_error)?;
    Ok(Json(link))
}

/// Delete a link
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .links
        .delete(&principal, &slug)
        .await
        .map_err(into_api_error)?;
    Ok(Json(SuccessResponse {
        message: "link deleted".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_granularity")]
    pub granularity: Granularity,
}

fn default_granularity() -> Granularity {
    Granularity::Day
}

/// Time-bucketed click series for a link
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(slug): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<StatPoint>>, ApiError> {
    let link = state
        .links
        .get(&principal, &slug)
        .await
        .map_err(into_api_error)?;
    let series = state
        .stats
        .series(link.id, query.granularity)
        .await
        .map_err(internal_error)?;
    Ok(Json(series))
}

/// Per-language click breakdown for a link
pub async fn get_language_stats(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(slug): Path<String>,
) -> Result<Json<Vec<LanguageCount>>, ApiError> {
    let link = state
        .links
        .get(&principal, &slug)
        .await
        .map_err(into_api_error)?;
    let counts = state
        .stats
        .languages(link.id)
        .await
        .map_err(internal_error)?;
    Ok(Json(counts))
}

fn require_blacklist_permission(principal: &Principal) -> Result<(), ApiError> {
    if principal.has_permission(permissions::MANAGE_BLACKLIST) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "blacklist management requires permission".to_string(),
            }),
        ))
    }
}

#[derive(Deserialize)]
pub struct BlacklistEntryRequest {
    pub host: String,
}

/// List blacklist entries
pub async fn list_blacklist(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<String>>, ApiError> {
    require_blacklist_permission(&principal)?;
    let hosts = state.blacklist.list().await.map_err(internal_error)?;
    Ok(Json(hosts))
}

/// Add a blacklist entry
pub async fn add_blacklist_entry(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<BlacklistEntryRequest>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    require_blacklist_permission(&principal)?;
    match state
        .blacklist
        .add(&payload.host)
        .await
        .map_err(internal_error)?
    {
        Some(host) => Ok((
            StatusCode::CREATED,
            Json(SuccessResponse {
                message: format!("blacklisted {host}"),
            }),
        )),
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "not a valid hostname".to_string(),
            }),
        )),
    }
}

/// Remove a blacklist entry
pub async fn remove_blacklist_entry(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(host): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    require_blacklist_permission(&principal)?;
    if state
        .blacklist
        .remove(&host)
        .await
        .map_err(internal_error)?
    {
        Ok(Json(SuccessResponse {
            message: format!("removed {host}"),
        }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "host not blacklisted".to_string(),
            }),
        ))
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
