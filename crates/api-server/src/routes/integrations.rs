//! Integration status aggregation and account linking.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::integrations::{IntegrationKind, IntegrationStatus};
use crate::state::AppState;

use super::auth::{auth_profile_from_headers, map_auth_error, RouteError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAccountRequest {
    pub integration: IntegrationKind,
    pub account_id: String,
}

/// Fan out to every provider concurrently. A provider failure degrades to
/// `connected: false` for that provider; the endpoint itself never fails
/// on upstream errors.
async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HashMap<&'static str, IntegrationStatus>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    let accounts = state
        .auth_store()
        .connected_accounts(profile.id)
        .await
        .map_err(map_auth_error)?;
    Ok(Json(state.integrations().status_all(&accounts).await))
}

async fn link_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LinkAccountRequest>,
) -> Result<Json<HashMap<&'static str, IntegrationStatus>>, RouteError> {
    let profile = auth_profile_from_headers(&state, &headers).await?;
    state
        .auth_store()
        .link_account(profile.id, req.integration, &req.account_id)
        .await
        .map_err(map_auth_error)?;

    let accounts = state
        .auth_store()
        .connected_accounts(profile.id)
        .await
        .map_err(map_auth_error)?;
    Ok(Json(state.integrations().status_all(&accounts).await))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/integrations/status", get(status))
        .route("/api/v1/integrations/link", post(link_account))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::integrations::{IntegrationKind, IntegrationsClient};
    use crate::state::AppState;

    /// Minimal provider double that reports one linked account.
    async fn spawn_provider() -> String {
        let app = axum::Router::new().route(
            "/status",
            axum::routing::get(|| async { axum::Json(json!({ "connected": true })) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn link_then_report_status() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_provider().await;
        let client = IntegrationsClient::with_base_urls(HashMap::from([(
            IntegrationKind::Telephony,
            base,
        )]));
        let state = AppState::with_integrations(temp_dir.path().to_path_buf(), client)
            .await
            .unwrap();
        let profile = state
            .auth_store()
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let (token, _exp) = state.auth_store().issue_token(&profile).unwrap();
        let app = super::router().with_state(state);

        let link_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/integrations/link")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        json!({ "integration": "telephony", "accountId": "acct-1" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(link_response.status(), StatusCode::OK);

        let status_response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/integrations/status")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(status_response.status(), StatusCode::OK);
        let body = to_bytes(status_response.into_body(), usize::MAX)
            .await
            .unwrap();
        let statuses: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(statuses["telephony"]["connected"], true);
        // Unlinked providers degrade quietly.
        assert_eq!(statuses["voice_agent"]["connected"], false);
        assert_eq!(statuses["video_conferencing"]["connected"], false);
        assert_eq!(statuses["email_link"]["connected"], false);
    }
}
