//! Product catalog routes.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crm_core::access::{Operation, ResourceCategory};
use crm_core::resource::Product;

use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_core_error, require_access, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub sku: Option<Option<String>>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub category_id: Option<Option<Uuid>>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn list_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
) -> Result<Json<Vec<Product>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Products,
        Operation::Read,
    )
    .await?;

    let products = state
        .crm_store()
        .list_products(team_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(products))
}

async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(team_id): Path<Uuid>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Products,
        Operation::Write,
    )
    .await?;

    let mut product = Product::new(team_id, req.name, req.price, profile.id);
    product.sku = req.sku;
    product.description = req.description;
    product.category_id = req.category_id;

    let product = state
        .crm_store()
        .create_product(product)
        .await
        .map_err(map_core_error)?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Product>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Products,
        Operation::Read,
    )
    .await?;

    let product = state
        .crm_store()
        .get_product(team_id, product_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, product_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Products,
        Operation::Update,
    )
    .await?;

    let mut product = state
        .crm_store()
        .get_product(team_id, product_id)
        .await
        .map_err(map_core_error)?;
    if let Some(name) = req.name {
        product.name = name;
    }
    if let Some(price) = req.price {
        product.price = price;
    }
    if let Some(sku) = req.sku {
        product.sku = sku;
    }
    if let Some(description) = req.description {
        product.description = description;
    }
    if let Some(category_id) = req.category_id {
        product.category_id = category_id;
    }

    let product = state
        .crm_store()
        .update_product(product)
        .await
        .map_err(map_core_error)?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((team_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeletedResponse>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    require_access(
        &state,
        team_id,
        profile.id,
        ResourceCategory::Products,
        Operation::Delete,
    )
    .await?;

    state
        .crm_store()
        .delete_product(team_id, product_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/teams/{team_id}/products",
            get(list_products).post(create_product),
        )
        .route(
            "/api/v1/teams/{team_id}/products/{product_id}",
            get(get_product).patch(update_product).delete(delete_product),
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

    #[tokio::test]
    async fn create_and_reprice_a_product() {
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

        let create_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/teams/{}/products", team.id))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({ "name": "Starter plan", "price": 29.0, "sku": "SP-01" })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create_response.status(), StatusCode::CREATED);
        let body = to_bytes(create_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let product: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(product["sku"], "SP-01");

        let patch_response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!(
                        "/api/v1/teams/{}/products/{}",
                        team.id,
                        product["id"].as_str().unwrap()
                    ))
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(json!({ "price": 35.0 }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(patch_response.status(), StatusCode::OK);
        let body = to_bytes(patch_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let updated: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated["price"], 35.0);
    }
}
