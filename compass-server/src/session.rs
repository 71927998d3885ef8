use std::sync::Arc;

use tokio::sync::watch;

use compass_types::{Identity, RoleSet, RoleTag, SessionInfo};

use crate::backend::IdentityBackend;

/// A signed-in principal together with the role tags it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    pub identity: Identity,
    pub roles: RoleSet,
}

impl ResolvedSession {
    pub fn is_admin(&self) -> bool {
        self.roles.is_admin()
    }

    pub fn is_partner(&self) -> bool {
        self.roles.is_partner()
    }

    pub fn effective_role(&self) -> RoleTag {
        self.roles.effective_role()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo::new(self.identity.clone(), &self.roles)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStatus {
    Pending,
    /// `None` is a completed resolution with nobody signed in.
    Resolved(Option<ResolvedSession>),
}

impl ResolutionStatus {
    pub fn session(&self) -> Option<&ResolvedSession> {
        match self {
            ResolutionStatus::Resolved(Some(session)) => Some(session),
            _ => None,
        }
    }
}

/// Resolves one caller's session and broadcasts every status change.
pub struct SessionResolver {
    backend: Arc<dyn IdentityBackend>,
    access_token: Option<String>,
    status: watch::Sender<ResolutionStatus>,
}

impl SessionResolver {
    pub fn new(backend: Arc<dyn IdentityBackend>, access_token: Option<String>) -> Self {
        let (status, _) = watch::channel(ResolutionStatus::Pending);
        Self {
            backend,
            access_token,
            status,
        }
    }

    pub fn status(&self) -> ResolutionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolutionStatus> {
        self.status.subscribe()
    }

    /// Returns the cached result once resolved; otherwise asks the backend.
    pub async fn resolve(&self) -> Option<ResolvedSession> {
        if let ResolutionStatus::Resolved(session) = &*self.status.borrow() {
            return session.clone();
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Option<ResolvedSession> {
        let resolved = self.fetch().await;
        self.status
            .send_replace(ResolutionStatus::Resolved(resolved.clone()));
        resolved
    }

    pub async fn sign_out(&self) {
        if let Some(token) = &self.access_token {
            if let Err(e) = self.backend.sign_out(token).await {
                tracing::warn!("Backend sign-out failed: {}", e);
            }
        }
        self.status.send_replace(ResolutionStatus::Resolved(None));
        tracing::info!("Session signed out");
    }

    async fn fetch(&self) -> Option<ResolvedSession> {
        let token = self.access_token.as_deref()?;

        let identity = match self.backend.current_identity(token).await {
            Ok(Some(identity)) => identity,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Identity lookup failed: {}", e);
                return None;
            }
        };

        let roles = match self.backend.roles(token, identity.user_id).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::warn!("Role lookup failed for {}: {}", identity.email, e);
                RoleSet::new()
            }
        };

        tracing::debug!(
            "Resolved session for {} as {}",
            identity.email,
            roles.effective_role()
        );
        Some(ResolvedSession { identity, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct StaticBackend {
        identity: Option<Identity>,
        roles: Result<Vec<RoleTag>, ()>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl IdentityBackend for StaticBackend {
        async fn current_identity(&self, _: &str) -> Result<Option<Identity>, BackendError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.identity.clone())
        }

        async fn roles(&self, _: &str, _: Uuid) -> Result<RoleSet, BackendError> {
            match &self.roles {
                Ok(tags) => Ok(tags.iter().copied().collect()),
                Err(()) => Err(BackendError::Network("down".to_string())),
            }
        }

        async fn sign_out(&self, _: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn backend(roles: Result<Vec<RoleTag>, ()>) -> Arc<StaticBackend> {
        Arc::new(StaticBackend {
            identity: Some(Identity {
                user_id: Uuid::new_v4(),
                email: "someone@example.com".to_string(),
            }),
            roles,
            lookups: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_starts_pending_and_caches() {
        let backend = backend(Ok(vec![RoleTag::Admin]));
        let resolver = SessionResolver::new(backend.clone(), Some("token".to_string()));
        assert_eq!(resolver.status(), ResolutionStatus::Pending);

        let session = resolver.resolve().await.unwrap();
        assert!(session.is_admin());
        resolver.resolve().await;
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 1);

        resolver.refresh().await;
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_token_resolves_absent() {
        let resolver = SessionResolver::new(backend(Ok(vec![])), None);
        assert!(resolver.resolve().await.is_none());
        assert_eq!(resolver.status(), ResolutionStatus::Resolved(None));
    }

    #[tokio::test]
    async fn test_role_failure_yields_standard_session() {
        let resolver = SessionResolver::new(backend(Err(())), Some("token".to_string()));
        let session = resolver.resolve().await.unwrap();
        assert!(!session.is_admin());
        assert!(!session.is_partner());
        assert_eq!(session.effective_role(), RoleTag::Standard);
    }

    #[tokio::test]
    async fn test_sign_out_publishes_absent() {
        let resolver = SessionResolver::new(backend(Ok(vec![RoleTag::Partner])), Some("t".to_string()));
        let mut rx = resolver.subscribe();
        resolver.resolve().await;
        assert!(rx.borrow_and_update().session().is_some());

        resolver.sign_out().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ResolutionStatus::Resolved(None));
    }
}
