//! Team and membership routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{AccessCheck, AccessMap, ResourceCategory, Role};
use crm_core::team::{Membership, Team};

use crate::auth::ProfileSummary;
use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_auth_error, map_core_error, RouteError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTeamSummary {
    pub team: Team,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user: ProfileSummary,
    #[serde(flatten)]
    pub membership: Membership,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityUpdate {
    pub category: ResourceCategory,
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTeamRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visibility: Option<Vec<VisibilityUpdate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertMemberRequest {
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub access: Option<AccessMap>,
}

async fn list_teams(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserTeamSummary>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let teams = state
        .team_store()
        .list_teams_for_user(profile.id)
        .await
        .map_err(map_core_error)?;

    Ok(Json(
        teams
            .into_iter()
            .map(|(team, role)| UserTeamSummary { team, role })
            .collect(),
    ))
}

async fn create_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTeamRequest>,
) -> Result<(StatusCode, Json<Team>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let team = state
        .team_store()
        .create_team(&req.name, profile.id)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn get_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<UserTeamSummary>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let access = state
        .team_store()
        .member_access(team_id, profile.id)
        .await
        .map_err(map_core_error)?;
    let team = state
        .team_store()
        .get_team(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(UserTeamSummary {
        team,
        role: access.role,
    }))
}

/// Rename and/or toggle category visibility. The store enforces manage
/// rights: the creator or an admin member.
async fn update_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;

    state
        .team_store()
        .member_access(team_id, profile.id)
        .await
        .map_err(map_core_error)?;
    let mut team = state
        .team_store()
        .get_team(team_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        team = state
            .team_store()
            .rename_team(team_id, profile.id, &name)
            .await
            .map_err(map_core_error)?;
    }
    if let Some(updates) = req.visibility {
        for update in updates {
            team = state
                .team_store()
                .set_visibility(team_id, profile.id, update.category, update.visible)
                .await
                .map_err(map_core_error)?;
        }
    }
    Ok(Json(team))
}

async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<MemberResponse>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let memberships = state
        .team_store()
        .list_members(team_id, profile.id)
        .await
        .map_err(map_core_error)?;

    let mut members = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let user = state
            .auth_store()
            .get_profile(membership.user_id)
            .await
            .map_err(map_auth_error)?;
        members.push(MemberResponse { user, membership });
    }
    Ok(Json(members))
}

/// Add a member by email, or update an existing member's role and access
/// map. Omitting the access map applies the role's defaults.
async fn upsert_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<UpsertMemberRequest>,
) -> Result<Json<MemberResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let user = state
        .auth_store()
        .find_by_email(&req.email)
        .await
        .map_err(map_auth_error)?;
    let membership = state
        .team_store()
        .upsert_member(team_id, profile.id, user.id, req.role, req.access)
        .await
        .map_err(map_core_error)?;
    Ok(Json(MemberResponse { user, membership }))
}

#[derive(Debug, Serialize)]
struct RemovedResponse {
    removed: bool,
}

async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RemovedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    state
        .team_store()
        .remove_member(team_id, profile.id, user_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(RemovedResponse { removed: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/teams", get(list_teams).post(create_team))
        .route("/api/v1/teams/{team_id}", get(get_team).patch(update_team))
        .route(
            "/api/v1/teams/{team_id}/members",
            get(list_members).post(upsert_member),
        )
        .route(
            "/api/v1/teams/{team_id}/members/{user_id}",
            delete(remove_member),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::state::AppState;

    async fn build_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(temp_dir.path().to_path_buf()).await.unwrap();
        (state, temp_dir)
    }

    async fn register(state: &AppState, email: &str, name: &str) -> (uuid::Uuid, String) {
        let profile = state
            .auth_store()
            .register(email, "verysecurepw", name)
            .await
            .unwrap();
        let (token, _exp) = state.auth_store().issue_token(&profile).unwrap();
        (profile.id, token)
    }

    #[tokio::test]
    async fn create_and_list_teams() {
        let (state, _temp) = build_state().await;
        let (_owner, token) = register(&state, "owner@example.com", "Owner").await;
        let app = super::router().with_state(state);

        let create_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/teams")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "name": "Sales" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create_response.status(), StatusCode::CREATED);

        let list_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/teams")
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
        let payload: Value = serde_json::from_slice(&body).unwrap();
        let items = payload.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["team"]["name"], "Sales");
        assert_eq!(items[0]["role"], "admin");
    }

    #[tokio::test]
    async fn non_member_cannot_read_a_team() {
        let (state, _temp) = build_state().await;
        let (owner, owner_token) = register(&state, "owner@example.com", "Owner").await;
        let (_outsider, outsider_token) =
            register(&state, "outsider@example.com", "Outsider").await;
        let team = state
            .team_store()
            .create_team("Sales", owner)
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/teams/{}", team.id))
                    .header("Authorization", format!("Bearer {}", outsider_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let owner_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/v1/teams/{}", team.id))
                    .header("Authorization", format!("Bearer {}", owner_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(owner_response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upsert_member_with_explicit_access_map() {
        let (state, _temp) = build_state().await;
        let (owner, token) = register(&state, "owner@example.com", "Owner").await;
        register(&state, "agent@example.com", "Agent").await;
        let team = state
            .team_store()
            .create_team("Sales", owner)
            .await
            .unwrap();
        let app = super::router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/teams/{}/members", team.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({
                            "email": "agent@example.com",
                            "role": "agent",
                            "access": { "leads": ["read"] }
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload["role"], "agent");
        assert_eq!(payload["access"]["leads"], json!(["read"]));
    }
}
