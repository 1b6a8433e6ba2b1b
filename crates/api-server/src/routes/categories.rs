//! Category routes. Names are unique per team, case-insensitively.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::Category;

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<Category>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Categories,
        Operation::Read,
    )
    .await?;

    let categories = state
        .crm_store()
        .list_categories(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Categories,
        Operation::Write,
    )
    .await?;

    let mut category = Category::new(team_id, req.name, profile.id);
    category.description = req.description;

    let category = state
        .crm_store()
        .create_category(category)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Category>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Categories,
        Operation::Read,
    )
    .await?;

    let category = state
        .crm_store()
        .get_category(team_id, category_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(category))
}

async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, category_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Categories,
        Operation::Update,
    )
    .await?;

    let mut category = state
        .crm_store()
        .get_category(team_id, category_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        category.name = name;
    }
    if let Some(description) = req.description {
        category.description = description;
    }

    let category = state
        .crm_store()
        .update_category(category)
        .await
        .map_err(map_core_error)?;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, category_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Categories,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_category(team_id, category_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/v1/teams/{team_id}/categories/{category_id}",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::state::AppState;

    #[tokio::test]
    async fn empty_category_name_is_rejected() {
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

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/teams/{}/categories", team.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "name": "" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_category_name_is_a_conflict() {
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

        for (name, expected) in [
            ("Hardware", StatusCode::CREATED),
            ("hardware", StatusCode::CONFLICT),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/v1/teams/{}/categories", team.id))
                        .header("Authorization", format!("Bearer {}", token))
                        .header("Content-Type", "application/json")
                        .body(Body::from(json!({ "name": name }).to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }
}
