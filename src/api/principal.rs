//! Principal extraction from trusted upstream headers.
//!
//! An authenticating proxy in front of the API performs the login handshake
//! and forwards the resolved claims; this core never validates credentials.
//! Expected headers:
//!
//! - `X-Auth-User`: user id (required)
//! - `X-Auth-Permissions`: comma-separated permission identifiers
//! - `X-Auth-Groups`: JSON array of `{"id", "domain", "name"}` objects

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap, StatusCode};
use axum::Json;

use crate::models::{GroupMembership, Principal};

use super::handlers::ErrorResponse;

const USER_HEADER: &str = "x-auth-user";
const PERMISSIONS_HEADER: &str = "x-auth-permissions";
const GROUPS_HEADER: &str = "x-auth-groups";

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

pub fn principal_from_headers(
    headers: &HeaderMap,
) -> Result<Principal, (StatusCode, Json<ErrorResponse>)> {
    let user_id = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| unauthorized("missing authenticated user"))?;

    let permissions = headers
        .get(PERMISSIONS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let groups: Vec<GroupMembership> = match headers.get(GROUPS_HEADER).map(|v| v.to_str()) {
        None => Vec::new(),
        Some(Ok(raw)) if raw.trim().is_empty() => Vec::new(),
        Some(Ok(raw)) => serde_json::from_str(raw)
            .map_err(|_| unauthorized("malformed group claims"))?,
        Some(Err(_)) => return Err(unauthorized("malformed group claims")),
    };

    Ok(Principal {
        user_id: user_id.to_string(),
        permissions,
        groups,
    })
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from_headers(&parts.headers)
    }
}
