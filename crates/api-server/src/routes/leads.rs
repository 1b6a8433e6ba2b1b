//! Lead CRUD routes.
//!
//! Every handler resolves the caller's membership within the team named in
//! the path, then checks the operation against the member's access map.
//! Listing filters are pushed down into the store query so an agent only
//! sees what the query allows.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::{Lead, LeadFilter, LeadStatus};

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub source: Option<Option<String>>,
    #[serde(default)]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListQuery {
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_leads(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Query(query): Query<LeadListQuery>,
) -> Result<Json<Vec<Lead>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Read,
    )
    .await?;

    let filter = LeadFilter {
        assigned_to: query.assigned_to,
        created_by: query.created_by,
    };
    let leads = state
        .crm_store()
        .list_leads(team_id, filter)
        .await
        .map_err(map_core_error)?;
    Ok(Json(leads))
}

async fn create_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Write,
    )
    .await?;

    let mut lead = Lead::new(team_id, req.name, req.email, profile.id);
    lead.phone = req.phone;
    lead.source = req.source;
    lead.notes = req.notes;
    lead.assigned_to = req.assigned_to;
    if let Some(status) = req.status {
        lead.status = status;
    }

    let lead = state
        .crm_store()
        .create_lead(lead)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, lead_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Lead>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Read,
    )
    .await?;

    let lead = state
        .crm_store()
        .get_lead(team_id, lead_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(lead))
}

async fn update_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, lead_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Update,
    )
    .await?;

    let mut lead = state
        .crm_store()
        .get_lead(team_id, lead_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        lead.name = name;
    }
    if let Some(email) = req.email {
        lead.email = email;
    }
    if let Some(phone) = req.phone {
        lead.phone = phone;
    }
    if let Some(status) = req.status {
        lead.status = status;
    }
    if let Some(source) = req.source {
        lead.source = source;
    }
    if let Some(notes) = req.notes {
        lead.notes = notes;
    }
    if let Some(assigned_to) = req.assigned_to {
        lead.assigned_to = assigned_to;
    }

    let lead = state
        .crm_store()
        .update_lead(lead)
        .await
        .map_err(map_core_error)?;
    Ok(Json(lead))
}

async fn delete_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, lead_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_lead(team_id, lead_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/leads",
            get(list_leads).post(create_lead),
        )
        .route(
            "/api/v1/teams/{team_id}/leads/{lead_id}",
            get(get_lead).patch(update_lead).delete(delete_lead),
        )
}
