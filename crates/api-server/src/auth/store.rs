use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::integrations::IntegrationKind;

const DEFAULT_JWT_SECRET: &str = "dev-jwt-secret-change-me";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60 * 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// Public shape of a user identity record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// User identity, separate from credential storage. External account ids
/// for third-party integrations hang off the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    id: Uuid,
    email: String,
    name: String,
    #[serde(default)]
    connected_accounts: HashMap<IntegrationKind, String>,
    created_at: DateTime<Utc>,
}

/// Email plus salted hash; one-to-one with Profile by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    email: String,
    password_hash: String,
}

#[derive(Debug, Default)]
struct AuthState {
    profiles: HashMap<Uuid, Profile>,
    credentials: HashMap<String, Credential>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredAuthState {
    profiles: Vec<Profile>,
    credentials: Vec<Credential>,
}

impl From<StoredAuthState> for AuthState {
    fn from(value: StoredAuthState) -> Self {
        Self {
            profiles: value
                .profiles
                .into_iter()
                .map(|item| (item.id, item))
                .collect(),
            credentials: value
                .credentials
                .into_iter()
                .map(|item| (item.email.clone(), item))
                .collect(),
        }
    }
}

impl From<&AuthState> for StoredAuthState {
    fn from(value: &AuthState) -> Self {
        Self {
            profiles: value.profiles.values().cloned().collect(),
            credentials: value.credentials.values().cloned().collect(),
        }
    }
}

#[derive(Clone)]
pub struct AuthStore {
    state: Arc<RwLock<AuthState>>,
    file_path: PathBuf,
    jwt_secret: String,
    token_ttl_seconds: i64,
}

impl AuthStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, AuthError> {
        tokio::fs::create_dir_all(&base_dir).await.map_err(|err| {
            AuthError::Storage(format!("Failed to create auth directory: {}", err))
        })?;

        let file_path = base_dir.join("auth.json");
        let state = load_state(&file_path).await?;
        let jwt_secret =
            std::env::var("CRM_JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());
        let token_ttl_seconds = std::env::var("CRM_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS);

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            file_path,
            jwt_secret,
            token_ttl_seconds,
        })
    }

    /// Register a user with email+password credentials.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<ProfileSummary, AuthError> {
        let normalized_email = normalize_email(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("Name cannot be empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state.credentials.contains_key(&normalized_email) {
            return Err(AuthError::Conflict(format!(
                "User '{}' already exists",
                normalized_email
            )));
        }

        let profile = Profile {
            id: Uuid::new_v4(),
            email: normalized_email.clone(),
            name: name.to_string(),
            connected_accounts: HashMap::new(),
            created_at: Utc::now(),
        };
        let credential = Credential {
            email: normalized_email.clone(),
            password_hash: hash_password(password),
        };
        state.profiles.insert(profile.id, profile.clone());
        state.credentials.insert(normalized_email, credential);
        persist_state(&self.file_path, &state).await?;
        Ok(profile_to_summary(&profile))
    }

    /// Password login. A missing user and a wrong password are reported
    /// identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<ProfileSummary, AuthError> {
        let normalized_email = normalize_email(email)?;
        let state = self.state.read().await;

        let credential = state
            .credentials
            .get(&normalized_email)
            .ok_or_else(|| AuthError::Unauthorized("Invalid credentials".to_string()))?;
        if !verify_password(&credential.password_hash, password) {
            return Err(AuthError::Unauthorized("Invalid credentials".to_string()));
        }

        let profile = state
            .profiles
            .values()
            .find(|profile| profile.email == normalized_email)
            .ok_or_else(|| AuthError::Unauthorized("Invalid credentials".to_string()))?;
        Ok(profile_to_summary(profile))
    }

    /// Resolve a bearer token into the stored profile.
    pub async fn authorize_bearer(&self, token: &str) -> Result<ProfileSummary, AuthError> {
        let claims = self.decode_claims(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::Unauthorized("Invalid token subject".to_string()))?;

        let state = self.state.read().await;
        let profile = state
            .profiles
            .get(&user_id)
            .ok_or_else(|| AuthError::Unauthorized("User not found".to_string()))?;
        Ok(profile_to_summary(profile))
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<ProfileSummary, AuthError> {
        let state = self.state.read().await;
        state
            .profiles
            .get(&user_id)
            .map(profile_to_summary)
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<ProfileSummary, AuthError> {
        let normalized_email = normalize_email(email)?;
        let state = self.state.read().await;
        state
            .profiles
            .values()
            .find(|profile| profile.email == normalized_email)
            .map(profile_to_summary)
            .ok_or_else(|| AuthError::NotFound(format!("User '{}' not found", normalized_email)))
    }

    /// External account ids the user linked, keyed by integration.
    pub async fn connected_accounts(
        &self,
        user_id: Uuid,
    ) -> Result<HashMap<IntegrationKind, String>, AuthError> {
        let state = self.state.read().await;
        state
            .profiles
            .get(&user_id)
            .map(|profile| profile.connected_accounts.clone())
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))
    }

    /// Link (or relink) the caller's external account for an integration.
    pub async fn link_account(
        &self,
        user_id: Uuid,
        integration: IntegrationKind,
        external_id: &str,
    ) -> Result<(), AuthError> {
        let external_id = external_id.trim();
        if external_id.is_empty() {
            return Err(AuthError::InvalidInput(
                "External account id cannot be empty".to_string(),
            ));
        }
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;
        profile
            .connected_accounts
            .insert(integration, external_id.to_string());
        persist_state(&self.file_path, &state).await
    }

    pub fn issue_token(&self, profile: &ProfileSummary) -> Result<(String, usize), AuthError> {
        let exp = (Utc::now() + Duration::seconds(self.token_ttl_seconds)).timestamp();
        let exp = usize::try_from(exp)
            .map_err(|_| AuthError::Storage("Failed to encode token expiration".to_string()))?;
        let claims = AuthClaims {
            sub: profile.id.to_string(),
            email: profile.email.clone(),
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|err| AuthError::Storage(format!("Failed to encode JWT: {}", err)))?;
        Ok((token, exp))
    }

    pub fn decode_claims(&self, token: &str) -> Result<AuthClaims, AuthError> {
        let decoded = decode::<AuthClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|err| AuthError::Unauthorized(format!("Invalid token: {}", err)))?;
        Ok(decoded.claims)
    }
}

fn profile_to_summary(profile: &Profile) -> ProfileSummary {
    ProfileSummary {
        id: profile.id,
        email: profile.email.clone(),
        name: profile.name.clone(),
        created_at: profile.created_at,
    }
}

async fn load_state(path: &Path) -> Result<AuthState, AuthError> {
    if !path.exists() {
        return Ok(AuthState::default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AuthError::Storage(format!("Failed to read auth state: {}", err)))?;
    if content.trim().is_empty() {
        return Ok(AuthState::default());
    }
    let stored: StoredAuthState = serde_json::from_str(&content)
        .map_err(|err| AuthError::Storage(format!("Failed to parse auth state: {}", err)))?;
    Ok(stored.into())
}

async fn persist_state(path: &Path, state: &AuthState) -> Result<(), AuthError> {
    let content = serde_json::to_string_pretty(&StoredAuthState::from(state))
        .map_err(|err| AuthError::Storage(format!("Failed to serialize auth state: {}", err)))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            AuthError::Storage(format!("Failed to create auth parent dir: {}", err))
        })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|err| AuthError::Storage(format!("Failed to write auth state: {}", err)))?;
    Ok(())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(AuthError::InvalidInput("Invalid email".to_string()));
    }
    Ok(normalized)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!(
        "v1${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(digest)
    )
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    let mut parts = stored_hash.split('$');
    let version = parts.next();
    let encoded_salt = parts.next();
    let encoded_digest = parts.next();
    if version != Some("v1") || encoded_salt.is_none() || encoded_digest.is_none() {
        return false;
    }

    let salt = match URL_SAFE_NO_PAD.decode(encoded_salt.unwrap()) {
        Ok(value) => value,
        Err(_) => return false,
    };
    let expected_digest = match URL_SAFE_NO_PAD.decode(encoded_digest.unwrap()) {
        Ok(value) => value,
        Err(_) => return false,
    };

    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    let actual_digest = hasher.finalize();
    expected_digest == actual_digest.as_slice()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn build_store() -> (AuthStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = AuthStore::new(temp_dir.path().join("auth")).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn register_and_login_roundtrip() {
        let (store, _temp_dir) = build_store().await;
        let profile = store
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let (token, _exp) = store.issue_token(&profile).unwrap();
        let authed = store.authorize_bearer(&token).await.unwrap();
        assert_eq!(authed.email, "owner@example.com");
        assert_eq!(authed.id, profile.id);

        let logged_in = store
            .login("Owner@Example.com", "verysecurepw")
            .await
            .unwrap();
        assert_eq!(logged_in.id, profile.id);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (store, _temp_dir) = build_store().await;
        store
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let result = store
            .register("owner@example.com", "otherpassword", "Imposter")
            .await;
        assert!(matches!(result, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (store, _temp_dir) = build_store().await;
        store
            .register("owner@example.com", "verysecurepw", "Owner")
            .await
            .unwrap();
        let result = store.login("owner@example.com", "not-the-password").await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn linked_accounts_survive_reload() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("auth");
        let user_id;

        {
            let store = AuthStore::new(base.clone()).await.unwrap();
            let profile = store
                .register("owner@example.com", "verysecurepw", "Owner")
                .await
                .unwrap();
            user_id = profile.id;
            store
                .link_account(user_id, IntegrationKind::Telephony, "acct-42")
                .await
                .unwrap();
        }

        {
            let store = AuthStore::new(base).await.unwrap();
            let accounts = store.connected_accounts(user_id).await.unwrap();
            assert_eq!(
                accounts.get(&IntegrationKind::Telephony).map(String::as_str),
                Some("acct-42")
            );
        }
    }
}
