//! Outbound status checks against the third-party integration services.
//!
//! The four checks run concurrently and fail independently: an unreachable
//! or erroring service degrades only its own entry to `connected: false`,
//! never the whole response.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// The external services whose link status the CRM surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    VideoConferencing,
    VoiceAgent,
    Telephony,
    EmailLink,
}

impl IntegrationKind {
    pub const ALL: [IntegrationKind; 4] = [
        Self::VideoConferencing,
        Self::VoiceAgent,
        Self::Telephony,
        Self::EmailLink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoConferencing => "video_conferencing",
            Self::VoiceAgent => "voice_agent",
            Self::Telephony => "telephony",
            Self::EmailLink => "email_link",
        }
    }

    fn base_url_env(self) -> &'static str {
        match self {
            Self::VideoConferencing => "CRM_VIDEO_API_URL",
            Self::VoiceAgent => "CRM_VOICE_API_URL",
            Self::Telephony => "CRM_TELEPHONY_API_URL",
            Self::EmailLink => "CRM_EMAIL_API_URL",
        }
    }
}

/// Normalized per-integration status entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl IntegrationStatus {
    fn disconnected() -> Self {
        Self {
            connected: false,
            account_id: None,
            detail: None,
        }
    }
}

/// Wire shape returned by the external status endpoints.
#[derive(Debug, Deserialize)]
struct RemoteStatus {
    connected: bool,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

pub struct IntegrationsClient {
    http: reqwest::Client,
    base_urls: HashMap<IntegrationKind, String>,
}

impl IntegrationsClient {
    /// Build a client from `CRM_*_API_URL` environment variables. An
    /// integration without a configured base URL always reports
    /// disconnected.
    pub fn from_env() -> Self {
        let base_urls = IntegrationKind::ALL
            .into_iter()
            .filter_map(|kind| {
                std::env::var(kind.base_url_env())
                    .ok()
                    .map(|url| (kind, url.trim_end_matches('/').to_string()))
            })
            .collect();
        Self::with_base_urls(base_urls)
    }

    pub fn with_base_urls(base_urls: HashMap<IntegrationKind, String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .unwrap_or_default();
        Self { http, base_urls }
    }

    /// Check every integration concurrently and merge the results into an
    /// object keyed by integration name. The four results are independent;
    /// there is no ordering requirement.
    pub async fn status_all(
        &self,
        accounts: &HashMap<IntegrationKind, String>,
    ) -> HashMap<&'static str, IntegrationStatus> {
        let checks = IntegrationKind::ALL
            .into_iter()
            .map(|kind| self.status_one(kind, accounts.get(&kind).map(String::as_str)));
        let statuses = join_all(checks).await;

        IntegrationKind::ALL
            .into_iter()
            .map(IntegrationKind::as_str)
            .zip(statuses)
            .collect()
    }

    /// A single status check. Any failure degrades to disconnected.
    async fn status_one(
        &self,
        kind: IntegrationKind,
        account: Option<&str>,
    ) -> IntegrationStatus {
        let Some(account) = account else {
            return IntegrationStatus::disconnected();
        };
        let Some(base_url) = self.base_urls.get(&kind) else {
            return IntegrationStatus::disconnected();
        };

        let url = format!("{}/status", base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("account", account)])
            .send()
            .await;

        let remote: Result<RemoteStatus, _> = match response {
            Ok(response) if response.status().is_success() => response.json().await,
            Ok(response) => {
                debug!(
                    integration = kind.as_str(),
                    status = %response.status(),
                    "integration status check returned an error"
                );
                return IntegrationStatus::disconnected();
            }
            Err(err) => {
                debug!(
                    integration = kind.as_str(),
                    error = %err,
                    "integration status check failed"
                );
                return IntegrationStatus::disconnected();
            }
        };

        match remote {
            Ok(remote) => IntegrationStatus {
                connected: remote.connected,
                account_id: Some(account.to_string()),
                detail: remote.detail,
            },
            Err(err) => {
                debug!(
                    integration = kind.as_str(),
                    error = %err,
                    "integration status body was malformed"
                );
                IntegrationStatus::disconnected()
            }
        }
    }
}
