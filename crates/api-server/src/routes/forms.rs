//! Custom form routes, including the public submission endpoint.
//!
//! Form definitions are managed under the `forms` access category. The
//! submission endpoint is unauthenticated: it backs embeddable lead-capture
//! widgets, so the form identifier is the only credential. Submissions on a
//! `creates_lead` form spawn a Lead best-effort after the response is
//! stored; a duplicate email leaves the response without a back-reference.

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::{CustomForm, FormField, FormResponse, Lead};

use crate::state::AppState;

use super::auth::{
    auth_profile_from_headers, bad_request, map_core_error, require_access, RouteError,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub creates_lead: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub fields: Option<Vec<FormField>>,
    #[serde(default)]
    pub creates_lead: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFormRequest {
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_forms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<CustomForm>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Read,
    )
    .await?;

    let forms = state
        .crm_store()
        .list_forms(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(forms))
}

async fn create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<CustomForm>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Write,
    )
    .await?;

    let mut form = CustomForm::new(team_id, req.name, profile.id);
    form.description = req.description;
    form.fields = req.fields;
    form.creates_lead = req.creates_lead;

    let form = state
        .crm_store()
        .create_form(form)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(form)))
}

async fn get_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, form_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CustomForm>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Read,
    )
    .await?;

    let form = state
        .crm_store()
        .get_form(team_id, form_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(form))
}

async fn update_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, form_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateFormRequest>,
) -> Result<Json<CustomForm>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Update,
    )
    .await?;

    let mut form = state
        .crm_store()
        .get_form(team_id, form_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        form.name = name;
    }
    if let Some(description) = req.description {
        form.description = description;
    }
    if let Some(fields) = req.fields {
        form.fields = fields;
    }
    if let Some(creates_lead) = req.creates_lead {
        form.creates_lead = creates_lead;
    }

    let form = state
        .crm_store()
        .update_form(form)
        .await
        .map_err(map_core_error)?;
    Ok(Json(form))
}

async fn delete_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, form_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_form(team_id, form_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

/// Public submission endpoint. No bearer token: the form id is the only
/// credential, as with any embeddable capture widget.
async fn submit_form(
    State(state): State<AppState>,
    Path((team_id, form_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SubmitFormRequest>,
) -> Result<(StatusCode, Json<FormResponse>), RouteError> {
    let form = state
        .crm_store()
        .get_form(team_id, form_id)
        .await
        .map_err(map_core_error)?;

    for field in form.fields.iter().filter(|field| field.required) {
        let missing = req
            .values
            .get(&field.key)
            .is_none_or(|value| value.is_null());
        if missing {
            return Err(bad_request(format!(
                "Missing required field '{}'",
                field.key
            )));
        }
    }

    let response = state
        .crm_store()
        .create_form_response(FormResponse::new(team_id, form_id, req.values))
        .await
        .map_err(map_core_error)?;

    let mut stored = response.clone();
    if form.creates_lead {
        if let Some(lead_id) = capture_lead(&state, &form, &response).await {
            stored.lead_id = Some(lead_id);
        }
    }
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Create a Lead from a stored submission, best-effort. The response is
/// already persisted; a duplicate email or a missing `email` value leaves
/// it without a lead back-reference.
async fn capture_lead(state: &AppState, form: &CustomForm, response: &FormResponse) -> Option<Uuid> {
    let email = response.values.get("email").and_then(|value| value.as_str())?;
    let name = response
        .values
        .get("name")
        .and_then(|value| value.as_str())
        .unwrap_or(email);

    let lead = Lead::new(form.team_id, name, email, form.created_by);
    match state.crm_store().create_lead(lead).await {
        Ok(lead) => {
            if let Err(err) = state
                .crm_store()
                .link_response_lead(response.id, lead.id)
                .await
            {
                tracing::warn!(error = %err, response_id = %response.id, "failed to link captured lead");
            }
            Some(lead.id)
        }
        Err(err) => {
            tracing::debug!(error = %err, form_id = %form.id, "form submission did not capture a lead");
            None
        }
    }
}

async fn list_responses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, form_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<FormResponse>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Forms,
        Operation::Read,
    )
    .await?;

    let responses = state
        .crm_store()
        .list_form_responses(team_id, form_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(responses))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/forms",
            get(list_forms).post(create_form),
        )
        .route(
            "/api/v1/teams/{team_id}/forms/{form_id}",
            get(get_form).patch(update_form).delete(delete_form),
        )
        .route(
            "/api/v1/teams/{team_id}/forms/{form_id}/responses",
            get(list_responses).post(submit_form),
        )
}
