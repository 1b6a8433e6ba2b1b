//! Dashboard aggregation route.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::DashboardSummary;

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

/// Counts across leads and tasks plus the caller's upcoming meetings.
/// Reads are authorized like any other: membership plus `read` on the
/// `dashboard` category.
async fn summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<DashboardSummary>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Dashboard,
        Operation::Read,
    )
    .await?;

    let summary = state
        .crm_store()
        .dashboard_summary(team_id, profile.id, Utc::now())
        .await
        .map_err(map_core_error)?;
    Ok(Json(summary))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/v1/teams/{team_id}/dashboard", get(summary))
}
