use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use compass_persistence::repositories::{ProfileRepository, RoleRepository};
use compass_types::{Identity, RoleSet, RoleTag};

use crate::auth::{AuthError, AuthService};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Identity backend unreachable: {0}")]
    Network(String),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Unexpected backend response: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Unexpected(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}

/// Source of the signed-in principal and its role tags.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// `Ok(None)` means the token carries no signed-in user.
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError>;

    async fn roles(&self, access_token: &str, user_id: Uuid) -> Result<RoleSet, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;
}

/// Dev tokens carry no expiry; their revocation is kept this long.
const UNTIMED_REVOCATION_SECS: u64 = 24 * 60 * 60;

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Signed-out tokens, each held only until it would have expired anyway.
#[derive(Debug, Default)]
struct RevocationList {
    entries: HashMap<String, u64>,
}

impl RevocationList {
    fn revoke(&mut self, token: &str, expires_at: u64, now: u64) {
        self.prune(now);
        if expires_at > now {
            self.entries.insert(token.to_string(), expires_at);
        }
    }

    fn is_revoked(&self, token: &str, now: u64) -> bool {
        self.entries
            .get(token)
            .is_some_and(|expires_at| *expires_at > now)
    }

    fn prune(&mut self, now: u64) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Validates tokens locally and reads roles from the local database.
pub struct DatabaseIdentityBackend {
    auth_service: Arc<AuthService>,
    roles: RoleRepository,
    profiles: ProfileRepository,
    revoked: RwLock<RevocationList>,
}

impl DatabaseIdentityBackend {
    pub fn new(
        auth_service: Arc<AuthService>,
        roles: RoleRepository,
        profiles: ProfileRepository,
    ) -> Self {
        Self {
            auth_service,
            roles,
            profiles,
            revoked: RwLock::new(RevocationList::default()),
        }
    }
}

#[async_trait]
impl IdentityBackend for DatabaseIdentityBackend {
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError> {
        if self.revoked.read().await.is_revoked(access_token, unix_now()) {
            return Ok(None);
        }

        let user = match self.auth_service.validate_token(access_token) {
            Ok(user) => user,
            Err(AuthError::InvalidKey) => {
                return Err(BackendError::Unexpected("no decoding key".to_string()));
            }
            Err(e) => {
                tracing::debug!("Token rejected: {}", e);
                return Ok(None);
            }
        };

        if let Err(e) = self
            .profiles
            .ensure_profile(&user.identity, user.full_name.clone())
            .await
        {
            tracing::warn!("Failed to ensure profile for {}: {}", user.identity.email, e);
        }

        Ok(Some(user.identity))
    }

    async fn roles(&self, _access_token: &str, user_id: Uuid) -> Result<RoleSet, BackendError> {
        self.roles
            .roles_for_user(user_id)
            .await
            .map_err(|e| BackendError::Unexpected(e.to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        // Tokens that no longer validate are already unusable
        let Ok(user) = self.auth_service.validate_token(access_token) else {
            return Ok(());
        };

        let now = unix_now();
        let expires_at = user
            .expires_at
            .unwrap_or(now + UNTIMED_REVOCATION_SECS);
        self.revoked.write().await.revoke(access_token, expires_at, now);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct HostedUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostedRoleRow {
    role: String,
}

/// Talks to a hosted auth + REST backend over HTTP.
pub struct HostedIdentityBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HostedIdentityBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }
}

#[async_trait]
impl IdentityBackend for HostedIdentityBackend {
    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, BackendError> {
        let response = self
            .request(reqwest::Method::GET, "/auth/v1/user", access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user: HostedUser = response.json().await?;
                Ok(Some(Identity {
                    user_id: user.id,
                    email: user.email.unwrap_or_default(),
                }))
            }
            status => Err(BackendError::Unexpected(format!("user lookup returned {}", status))),
        }
    }

    async fn roles(&self, access_token: &str, user_id: Uuid) -> Result<RoleSet, BackendError> {
        let path = format!("/rest/v1/user_roles?user_id=eq.{}&select=role", user_id);
        let response = self
            .request(reqwest::Method::GET, &path, access_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::NotAuthenticated),
            status if status.is_success() => {
                let rows: Vec<HostedRoleRow> = response.json().await?;
                Ok(rows
                    .iter()
                    .filter_map(|row| match row.role.parse::<RoleTag>() {
                        Ok(tag) => Some(tag),
                        Err(e) => {
                            tracing::warn!("Skipping role row: {}", e);
                            None
                        }
                    })
                    .collect())
            }
            status => Err(BackendError::Unexpected(format!("role lookup returned {}", status))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::POST, "/auth/v1/logout", access_token)
            .send()
            .await?;

        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(BackendError::Unexpected(format!(
                "logout returned {}",
                response.status()
            )))
        }
    }
}
