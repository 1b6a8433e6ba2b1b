//! Authentication routes plus the helpers every handler family shares:
//! bearer-session resolution, error mapping and the permission check.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{AccessCheck, MemberAccess, Operation, ResourceCategory};

use crate::auth::{AuthError, ProfileSummary};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type RouteError = (StatusCode, Json<ErrorResponse>);

pub fn route_error(status: StatusCode, error: impl Into<String>) -> RouteError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn unauthorized(error: impl std::fmt::Display) -> RouteError {
    route_error(StatusCode::UNAUTHORIZED, error.to_string())
}

pub fn bad_request(error: impl std::fmt::Display) -> RouteError {
    route_error(StatusCode::BAD_REQUEST, error.to_string())
}

/// Map auth store failures onto the HTTP taxonomy.
pub fn map_auth_error(err: AuthError) -> RouteError {
    match err {
        AuthError::InvalidInput(message) => route_error(StatusCode::BAD_REQUEST, message),
        AuthError::Unauthorized(message) => route_error(StatusCode::UNAUTHORIZED, message),
        AuthError::NotFound(message) => route_error(StatusCode::NOT_FOUND, message),
        AuthError::Conflict(message) => route_error(StatusCode::CONFLICT, message),
        AuthError::Storage(message) => {
            tracing::error!(error = %message, "auth store failure");
            route_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Map core store failures onto the HTTP taxonomy. Storage and
/// serialization details stay in the server log.
pub fn map_core_error(err: crm_core::Error) -> RouteError {
    use crm_core::Error;
    match err {
        Error::TeamNotFound(message) | Error::NotFound(message) => {
            route_error(StatusCode::NOT_FOUND, message)
        }
        Error::NoAccess(message) => route_error(StatusCode::FORBIDDEN, message),
        Error::Conflict(message) => route_error(StatusCode::CONFLICT, message),
        Error::InvalidInput(message) => route_error(StatusCode::BAD_REQUEST, message),
        Error::Io(_) | Error::Serialization(_) | Error::Storage(_) => {
            tracing::error!(error = %err, "store failure");
            route_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Resolve the caller's profile from the `Authorization: Bearer` header.
pub async fn auth_profile_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<ProfileSummary, RouteError> {
    let header = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Expected a bearer token"))?;
    state
        .auth_store()
        .authorize_bearer(token)
        .await
        .map_err(map_auth_error)
}

/// The permission check every team-scoped handler runs after
/// authentication: membership lookup plus the required-operation test.
/// Admins pass regardless of their access map.
pub async fn require_access(
    state: &AppState,
    team_id: Uuid,
    user_id: Uuid,
    category: ResourceCategory,
    operation: Operation,
) -> Result<MemberAccess, RouteError> {
    let access = state
        .team_store()
        .member_access(team_id, user_id)
        .await
        .map_err(map_core_error)?;
    if !access.allows(category, operation) {
        return Err(route_error(
            StatusCode::FORBIDDEN,
            format!(
                "Role '{}' lacks {:?} access on {:?}",
                access.role.as_str(),
                operation,
                category
            ),
        ));
    }
    Ok(access)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    expires_at: String,
    user_id: Uuid,
    email: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: Uuid,
    email: String,
    name: String,
    created_at: String,
}

fn format_expiry(exp: usize) -> String {
    DateTime::<Utc>::from_timestamp(exp as i64, 0)
        .map(|value| value.to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), RouteError> {
    let profile = state
        .auth_store()
        .register(&req.email, &req.password, &req.name)
        .await
        .map_err(map_auth_error)?;
    let (token, exp) = state
        .auth_store()
        .issue_token(&profile)
        .map_err(map_auth_error)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_at: format_expiry(exp),
            user_id: profile.id,
            email: profile.email,
            name: profile.name,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, RouteError> {
    let profile = state
        .auth_store()
        .login(&req.email, &req.password)
        .await
        .map_err(map_auth_error)?;
    let (token, exp) = state
        .auth_store()
        .issue_token(&profile)
        .map_err(map_auth_error)?;

    Ok(Json(AuthResponse {
        token,
        expires_at: format_expiry(exp),
        user_id: profile.id,
        email: profile.email,
        name: profile.name,
    }))
}

async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    Ok(Json(MeResponse {
        user_id: profile.id,
        email: profile.email,
        name: profile.name,
        created_at: profile.created_at.to_rfc3339(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/me", get(me))
}
