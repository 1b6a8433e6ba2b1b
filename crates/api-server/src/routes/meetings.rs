//! Meeting CRUD routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::Meeting;

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub location: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_meetings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<Meeting>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Meetings,
        Operation::Read,
    )
    .await?;

    let meetings = state
        .crm_store()
        .list_meetings(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(meetings))
}

async fn create_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Meetings,
        Operation::Write,
    )
    .await?;

    let mut meeting = Meeting::new(team_id, req.title, req.starts_at, profile.id);
    meeting.ends_at = req.ends_at;
    meeting.location = req.location;
    meeting.notes = req.notes;
    meeting.assigned_to = req.assigned_to;

    let meeting = state
        .crm_store()
        .create_meeting(meeting)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

async fn get_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, meeting_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Meeting>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Meetings,
        Operation::Read,
    )
    .await?;

    let meeting = state
        .crm_store()
        .get_meeting(team_id, meeting_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(meeting))
}

async fn update_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, meeting_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMeetingRequest>,
) -> Result<Json<Meeting>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Meetings,
        Operation::Update,
    )
    .await?;

    let mut meeting = state
        .crm_store()
        .get_meeting(team_id, meeting_id)
        .await
        .map_err(map_core_error)?;
    if let Some(title) = req.title {
        meeting.title = title;
    }
    if let Some(starts_at) = req.starts_at {
        meeting.starts_at = starts_at;
    }
    if let Some(ends_at) = req.ends_at {
        meeting.ends_at = ends_at;
    }
    if let Some(location) = req.location {
        meeting.location = location;
    }
    if let Some(notes) = req.notes {
        meeting.notes = notes;
    }
    if let Some(assigned_to) = req.assigned_to {
        meeting.assigned_to = assigned_to;
    }

    let meeting = state
        .crm_store()
        .update_meeting(meeting)
        .await
        .map_err(map_core_error)?;
    Ok(Json(meeting))
}

async fn delete_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, meeting_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Meetings,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_meeting(team_id, meeting_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/meetings",
            get(list_meetings).post(create_meeting),
        )
        .route(
            "/api/v1/teams/{team_id}/meetings/{meeting_id}",
            get(get_meeting).patch(update_meeting).delete(delete_meeting),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::state::AppState;

    #[tokio::test]
    async fn meetings_list_in_start_order() {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).await.unwrap();
        let profile = state
            .auth_store()
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let (token, _exp) = state.auth_store().issue_token(&profile).unwrap();
        let team = state
            .team_store()
            .create_team("Sales", profile.id)
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let later = Utc::now() + Duration::hours(4);
        let sooner = Utc::now() + Duration::hours(1);
        for (title, starts_at) in [("Later", later), ("Sooner", sooner)] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/v1/teams/{}/meetings", team.id))
                        .header("Authorization", format!("Bearer {}", token))
                        .header("Content-Type", "application/json")
                        .body(Body::from(
                            json!({ "title": title, "startsAt": starts_at }).to_string(),
                        ))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let list_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/teams/{}/meetings", team.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(list_response.status(), StatusCode::OK);
        let body = to_bytes(list_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let meetings: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(meetings[0]["title"], "Sooner");
        assert_eq!(meetings[1]["title"], "Later");
    }
}
