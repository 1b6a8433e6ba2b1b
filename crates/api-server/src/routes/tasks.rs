//! Task CRUD routes.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::{TaskItem, TaskPriority, TaskStatus};

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<TaskItem>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Tasks,
        Operation::Read,
    )
    .await?;

    let tasks = state
        .crm_store()
        .list_tasks(team_id, query.assigned_to)
        .await
        .map_err(map_core_error)?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskItem>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Tasks,
        Operation::Write,
    )
    .await?;

    let mut task = TaskItem::new(team_id, req.title, profile.id);
    task.description = req.description;
    task.due_at = req.due_at;
    task.assigned_to = req.assigned_to;
    if let Some(priority) = req.priority {
        task.priority = priority;
    }

    let task = state
        .crm_store()
        .create_task(task)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<TaskItem>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Tasks,
        Operation::Read,
    )
    .await?;

    let task = state
        .crm_store()
        .get_task(team_id, task_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskItem>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Tasks,
        Operation::Update,
    )
    .await?;

    let mut task = state
        .crm_store()
        .get_task(team_id, task_id)
        .await
        .map_err(map_core_error)?;
    if let Some(title) = req.title {
        task.title = title;
    }
    if let Some(description) = req.description {
        task.description = description;
    }
    if let Some(status) = req.status {
        task.status = status;
    }
    if let Some(priority) = req.priority {
        task.priority = priority;
    }
    if let Some(due_at) = req.due_at {
        task.due_at = due_at;
    }
    if let Some(assigned_to) = req.assigned_to {
        task.assigned_to = assigned_to;
    }

    let task = state
        .crm_store()
        .update_task(task)
        .await
        .map_err(map_core_error)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Tasks,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_task(team_id, task_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/tasks",
            get(list_tasks).post(create_task),
        )
        .route(
            "/api/v1/teams/{team_id}/tasks/{task_id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}
