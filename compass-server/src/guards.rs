use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::session::{ResolutionStatus, ResolvedSession};

pub const LANDING_ROUTE: &str = "/";

pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Remembers every navigation request; HTTP handlers turn the last one
/// into a redirect.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|visited| visited.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(path.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Admin,
    Partner,
}

impl RequiredRole {
    fn satisfied_by(self, session: &ResolvedSession) -> bool {
        match self {
            RequiredRole::Admin => session.is_admin(),
            RequiredRole::Partner => session.is_partner(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Pending,
    Authorized,
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    Loading,
    Content,
    Hidden,
}

#[derive(Debug)]
pub struct RouteGuard {
    required: RequiredRole,
    state: GuardState,
}

impl RouteGuard {
    pub fn new(required: RequiredRole) -> Self {
        Self {
            required,
            state: GuardState::Pending,
        }
    }

    pub fn admin() -> Self {
        Self::new(RequiredRole::Admin)
    }

    pub fn partner_vault() -> Self {
        Self::new(RequiredRole::Partner)
    }

    pub fn required(&self) -> RequiredRole {
        self.required
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn view(&self) -> GuardView {
        match self.state {
            GuardState::Pending => GuardView::Loading,
            GuardState::Authorized => GuardView::Content,
            GuardState::Unauthorized => GuardView::Hidden,
        }
    }

    pub fn evaluate(&self, status: &ResolutionStatus) -> GuardState {
        match status {
            ResolutionStatus::Pending => GuardState::Pending,
            ResolutionStatus::Resolved(Some(session)) if self.required.satisfied_by(session) => {
                GuardState::Authorized
            }
            ResolutionStatus::Resolved(_) => GuardState::Unauthorized,
        }
    }

    /// Navigates to the landing route only on entry into `Unauthorized`.
    pub fn observe(&mut self, status: &ResolutionStatus, navigator: &dyn Navigator) -> GuardState {
        let next = self.evaluate(status);
        if next == GuardState::Unauthorized && self.state != GuardState::Unauthorized {
            tracing::debug!("{:?} guard denied access, redirecting", self.required);
            navigator.navigate(LANDING_ROUTE);
        }
        self.state = next;
        next
    }
}

/// Re-run `guard` on every status change until the sender is dropped.
pub async fn watch_guard(
    mut guard: RouteGuard,
    mut status: watch::Receiver<ResolutionStatus>,
    navigator: Arc<dyn Navigator>,
) -> RouteGuard {
    loop {
        let current = status.borrow_and_update().clone();
        guard.observe(&current, navigator.as_ref());
        if status.changed().await.is_err() {
            return guard;
        }
    }
}
