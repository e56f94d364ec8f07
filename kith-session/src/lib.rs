//! Session state: who is signed in right now.
//!
//! Every store reads the session but none of them own it. The identity lives
//! in a `tokio::sync::watch` channel so UI consumers get a reactive
//! auth-change signal without the session knowing who is listening. The auth
//! service itself (credentials, tokens) is an external collaborator; the
//! session only holds the identity it hands us.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use kith_shared::errors::{AppError, AppResult, ErrorCode};

/// The authenticated user as the stores see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Shared session handle. Cloning is cheap; all clones observe the same
/// identity. Created at session start, cleared at logout.
#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, user: AuthUser) {
        tracing::info!(user_id = %user.id, display_name = %user.display_name, "signed in");
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.tx.send_replace(None) {
            tracing::info!(user_id = %user.id, "signed out");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|u| u.id.clone())
    }

    pub fn display_name(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|u| u.display_name.clone())
    }

    /// The signed-in user, or a `NotSignedIn` error for operations that
    /// cannot proceed anonymously.
    pub fn require_user(&self) -> AppResult<AuthUser> {
        self.current_user()
            .ok_or_else(|| AppError::new(ErrorCode::NotSignedIn, "no user is signed in"))
    }

    /// Reactive auth-change signal: resolves whenever the identity changes
    /// (sign-in, sign-out, or account switch).
    pub fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out_round_trip() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert!(session.require_user().is_err());

        session.sign_in(AuthUser::new("A", "alice").with_email("alice@example.com"));
        assert!(session.is_authenticated());
        assert_eq!(session.user_id().as_deref(), Some("A"));
        assert_eq!(session.display_name().as_deref(), Some("alice"));
        assert_eq!(session.require_user().unwrap().id, "A");

        session.sign_out();
        assert!(!session.is_authenticated());
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn clones_share_identity() {
        let session = Session::new();
        let other = session.clone();
        session.sign_in(AuthUser::new("A", "alice"));
        assert_eq!(other.user_id().as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn watch_observes_auth_changes() {
        let session = Session::new();
        let mut rx = session.watch();

        session.sign_in(AuthUser::new("A", "alice"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().id, "A");

        session.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn require_user_error_has_session_code() {
        let session = Session::new();
        let err = session.require_user().unwrap_err();
        assert_eq!(err.code(), "E1001");
    }
}
