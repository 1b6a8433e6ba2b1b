//! Organization routes.
//!
//! Organizations belong to the sales pipeline and have no access category
//! of their own; they are governed by the caller's `leads` grants.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::Organization;

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<Option<String>>,
    #[serde(default)]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_organizations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<Organization>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Read,
    )
    .await?;

    let organizations = state
        .crm_store()
        .list_organizations(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(organizations))
}

async fn create_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Write,
    )
    .await?;

    let mut organization = Organization::new(team_id, req.name, profile.id);
    organization.domain = req.domain;
    organization.phone = req.phone;
    organization.address = req.address;

    let organization = state
        .crm_store()
        .create_organization(organization)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(organization)))
}

async fn get_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, organization_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Organization>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Read,
    )
    .await?;

    let organization = state
        .crm_store()
        .get_organization(team_id, organization_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(organization))
}

async fn update_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, organization_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Leads,
        Operation::Update,
    )
    .await?;

    let mut organization = state
        .crm_store()
        .get_organization(team_id, organization_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        organization.name = name;
    }
    if let Some(domain) = req.domain {
        organization.domain = domain;
    }
    if let Some(phone) = req.phone {
        organization.phone = phone;
    }
    if let Some(address) = req.address {
        organization.address = address;
    }

    let organization = state
        .crm_store()
        .update_organization(organization)
        .await
        .map_err(map_core_error)?;
    Ok(Json(organization))
}

async fn delete_organization(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, organization_id)): Path<(Uuid, Uuid)>,
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
        .delete_organization(team_id, organization_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/organizations",
            get(list_organizations).post(create_organization),
        )
        .route(
            "/api/v1/teams/{team_id}/organizations/{organization_id}",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
}
