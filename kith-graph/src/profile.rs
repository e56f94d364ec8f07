use std::sync::{Arc, Mutex};

use serde_json::json;
use validator::Validate;

use kith_session::Session;
use kith_shared::collections;
use kith_shared::errors::{AppError, AppResult, ErrorCode};
use kith_shared::gateway::{fields, Filter, Gateway};

use crate::models::{NewProfile, UpdateProfile, UserProfile};

#[derive(Debug, Clone, Default)]
pub struct ProfileState {
    /// The profile currently being viewed (not necessarily the session
    /// user's own).
    pub profile: Option<UserProfile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Profile documents: owner-edited fields plus the follower set other users
/// append themselves to.
#[derive(Clone)]
pub struct ProfileStore {
    gateway: Arc<dyn Gateway>,
    session: Session,
    state: Arc<Mutex<ProfileState>>,
}

impl ProfileStore {
    pub fn new(gateway: Arc<dyn Gateway>, session: Session) -> Self {
        Self {
            gateway,
            session,
            state: Arc::new(Mutex::new(ProfileState::default())),
        }
    }

    pub fn state(&self) -> ProfileState {
        self.state.lock().unwrap().clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.lock().unwrap().profile.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn reset(&self) {
        *self.state.lock().unwrap() = ProfileState::default();
    }

    fn begin(&self) {
        let mut state = self.state.lock().unwrap();
        state.is_loading = true;
        state.error = None;
    }

    fn fail(&self, op: &'static str, err: AppError) {
        tracing::error!(op, error = %err, code = err.code(), "profile store operation failed");
        let mut state = self.state.lock().unwrap();
        state.error = Some(err.to_string());
        state.is_loading = false;
    }

    /// Load the profile owned by `user_id` into the local cache.
    pub async fn fetch_profile(&self, user_id: &str) {
        self.begin();
        match self.lookup(user_id).await {
            Ok(profile) => {
                let mut state = self.state.lock().unwrap();
                state.profile = Some(profile);
                state.is_loading = false;
            }
            Err(err) => self.fail("fetch_profile", err),
        }
    }

    /// Insert the profile document at registration.
    pub async fn create_profile(&self, user_id: &str, profile: NewProfile) {
        self.begin();
        if user_id.is_empty() {
            self.fail("create_profile", AppError::validation("userId is required"));
            return;
        }
        if let Err(err) = profile.validate() {
            self.fail("create_profile", AppError::validation(err.to_string()));
            return;
        }
        let doc = fields(json!({
            "user_id": user_id,
            "username": profile.username,
            "email": profile.email,
            "bio": profile.bio,
            "profile_picture": profile.profile_picture,
            "followers": [],
        }));
        match self.gateway.insert(collections::USERS, doc).await {
            Ok(id) => {
                tracing::info!(user_id, doc_id = %id, "profile created");
                let mut state = self.state.lock().unwrap();
                state.profile = Some(UserProfile {
                    id,
                    user_id: user_id.to_string(),
                    username: profile.username,
                    email: profile.email,
                    bio: profile.bio,
                    profile_picture: profile.profile_picture,
                    followers: Vec::new(),
                });
                state.is_loading = false;
            }
            Err(err) => self.fail("create_profile", err),
        }
    }

    /// Owner edit. The local cache is merged only after the write succeeds;
    /// there is nothing to roll back on failure.
    pub async fn update_profile(&self, user_id: &str, changes: UpdateProfile) {
        self.begin();
        if let Err(err) = changes.validate() {
            self.fail("update_profile", AppError::validation(err.to_string()));
            return;
        }
        let current = match self.lookup(user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                self.fail("update_profile", err);
                return;
            }
        };

        let mut partial = serde_json::Map::new();
        if let Some(username) = &changes.username {
            partial.insert("username".into(), json!(username));
        }
        if let Some(bio) = &changes.bio {
            partial.insert("bio".into(), json!(bio));
        }
        if let Some(picture) = &changes.profile_picture {
            partial.insert("profile_picture".into(), json!(picture));
        }
        if partial.is_empty() {
            self.state.lock().unwrap().is_loading = false;
            return;
        }

        match self
            .gateway
            .update(collections::USERS, &current.id, partial)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id, "profile updated");
                let mut state = self.state.lock().unwrap();
                if let Some(profile) = state.profile.as_mut().filter(|p| p.user_id == user_id) {
                    if let Some(username) = changes.username {
                        profile.username = username;
                    }
                    if let Some(bio) = changes.bio {
                        profile.bio = Some(bio);
                    }
                    if let Some(picture) = changes.profile_picture {
                        profile.profile_picture = Some(picture);
                    }
                }
                state.is_loading = false;
            }
            Err(err) => self.fail("update_profile", err),
        }
    }

    /// Add the session user to `target_id`'s follower set (set semantics).
    /// The cached follower list is bumped optimistically and reverted if the
    /// write fails.
    pub async fn follow_user(&self, target_id: &str) {
        let me = match self.session.require_user() {
            Ok(user) => user,
            Err(err) => {
                self.fail("follow_user", err);
                return;
            }
        };
        if me.id == target_id {
            self.fail(
                "follow_user",
                AppError::new(ErrorCode::ValidationError, "cannot follow yourself"),
            );
            return;
        }

        // Optimistic bump of the viewed profile, if it is the target.
        let bumped = {
            let mut state = self.state.lock().unwrap();
            match state.profile.as_mut().filter(|p| p.user_id == target_id) {
                Some(profile) if !profile.followers.contains(&me.id) => {
                    profile.followers.push(me.id.clone());
                    true
                }
                _ => false,
            }
        };

        let result: AppResult<()> = async {
            let target = self.lookup(target_id).await?;
            let mut followers = target.followers;
            if !followers.contains(&me.id) {
                followers.push(me.id.clone());
            }
            self.gateway
                .update(
                    collections::USERS,
                    &target.id,
                    fields(json!({ "followers": followers })),
                )
                .await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(follower = %me.id, target = target_id, "followed user");
            }
            Err(err) => {
                if bumped {
                    let mut state = self.state.lock().unwrap();
                    if let Some(profile) =
                        state.profile.as_mut().filter(|p| p.user_id == target_id)
                    {
                        profile.followers.retain(|f| f != &me.id);
                    }
                }
                self.fail("follow_user", err);
            }
        }
    }

    async fn lookup(&self, user_id: &str) -> AppResult<UserProfile> {
        if user_id.is_empty() {
            return Err(AppError::validation("userId is required"));
        }
        let docs = self
            .gateway
            .query(
                collections::USERS,
                &[Filter::eq("user_id", user_id)],
                None,
                Some(1),
            )
            .await?;
        docs.first()
            .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, format!("no profile for user {user_id}")))?
            .decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kith_session::AuthUser;
    use kith_shared::gateway::MemoryGateway;

    fn setup() -> (MemoryGateway, Session, ProfileStore) {
        let gw = MemoryGateway::new();
        let session = Session::new();
        let store = ProfileStore::new(Arc::new(gw.clone()), session.clone());
        (gw, session, store)
    }

    fn new_profile(username: &str) -> NewProfile {
        NewProfile {
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            bio: None,
            profile_picture: None,
        }
    }

    #[tokio::test]
    async fn create_then_fetch_profile() {
        let (_gw, _session, store) = setup();
        store.create_profile("A", new_profile("alice")).await;
        assert_eq!(store.error(), None);

        store.fetch_profile("A").await;
        let profile = store.profile().unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.followers_count(), 0);
    }

    #[tokio::test]
    async fn fetch_missing_profile_records_error() {
        let (_gw, _session, store) = setup();
        store.fetch_profile("ghost").await;
        assert!(store.error().is_some());
        assert!(store.profile().is_none());
        assert!(!store.state().is_loading);
    }

    #[tokio::test]
    async fn update_profile_merges_locally_after_success() {
        let (_gw, _session, store) = setup();
        store.create_profile("A", new_profile("alice")).await;

        store
            .update_profile(
                "A",
                UpdateProfile {
                    bio: Some("hello there".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(store.error(), None);
        assert_eq!(store.profile().unwrap().bio.as_deref(), Some("hello there"));

        // Remote copy matches.
        store.fetch_profile("A").await;
        assert_eq!(store.profile().unwrap().bio.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_gateway() {
        let (gw, _session, store) = setup();
        store.create_profile("A", new_profile("ab")).await; // too short
        assert!(store.error().is_some());
        assert_eq!(gw.count(collections::USERS), 0);
    }

    #[tokio::test]
    async fn follow_user_appends_once() {
        let (_gw, session, store) = setup();
        store.create_profile("B", new_profile("bob")).await;
        session.sign_in(AuthUser::new("A", "alice"));

        store.fetch_profile("B").await;
        store.follow_user("B").await;
        store.follow_user("B").await; // idempotent, set semantics
        assert_eq!(store.error(), None);

        store.fetch_profile("B").await;
        assert_eq!(store.profile().unwrap().followers, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn follow_failure_reverts_the_optimistic_bump() {
        let (gw, session, store) = setup();
        store.create_profile("B", new_profile("bob")).await;
        session.sign_in(AuthUser::new("A", "alice"));
        store.fetch_profile("B").await;

        gw.set_fail_writes(true);
        store.follow_user("B").await;

        assert!(store.error().is_some());
        assert!(store.profile().unwrap().followers.is_empty());
    }
}
