//! Application state

use std::path::PathBuf;
use std::sync::Arc;

use crm_core::resource::FileCrmStore;
use crm_core::team::FileTeamStore;

use crate::auth::{AuthError, AuthStore};
use crate::integrations::IntegrationsClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    auth_store: AuthStore,
    team_store: FileTeamStore,
    crm_store: FileCrmStore,
    integrations: IntegrationsClient,
}

impl AppState {
    /// Create a new AppState with the given data directory
    pub async fn new(data_dir: PathBuf) -> Result<Self, AuthError> {
        let auth_store = AuthStore::new(data_dir.join("auth")).await?;
        let team_store = FileTeamStore::new(data_dir.join("teams.json"))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        let crm_store = FileCrmStore::new(data_dir.join("crm.json"))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        let integrations = IntegrationsClient::from_env();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                auth_store,
                team_store,
                crm_store,
                integrations,
            }),
        })
    }

    /// State wired with an explicit integrations client, used by tests.
    pub async fn with_integrations(
        data_dir: PathBuf,
        integrations: IntegrationsClient,
    ) -> Result<Self, AuthError> {
        let auth_store = AuthStore::new(data_dir.join("auth")).await?;
        let team_store = FileTeamStore::new(data_dir.join("teams.json"))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        let crm_store = FileCrmStore::new(data_dir.join("crm.json"))
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                auth_store,
                team_store,
                crm_store,
                integrations,
            }),
        })
    }

    pub fn auth_store(&self) -> &AuthStore {
        &self.inner.auth_store
    }

    pub fn team_store(&self) -> &FileTeamStore {
        &self.inner.team_store
    }

    pub fn crm_store(&self) -> &FileCrmStore {
        &self.inner.crm_store
    }

    pub fn integrations(&self) -> &IntegrationsClient {
        &self.inner.integrations
    }
}
