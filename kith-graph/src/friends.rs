use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use kith_shared::collections;
use kith_shared::config::AppConfig;
use kith_shared::errors::{AppError, AppResult, ErrorCode};
use kith_shared::gateway::{decode_all, fields, Filter, Gateway, OrderBy};

use crate::models::{FriendEdge, FriendRequest, UserProfile, STATUS_PENDING};

/// Highest-codepoint sentinel closing the username prefix range.
const PREFIX_SENTINEL: char = '\u{f8ff}';

/// Locally cached slice of the social graph, as the UI reads it.
#[derive(Debug, Clone, Default)]
pub struct FriendState {
    pub friends: Vec<FriendEdge>,
    pub friend_requests: Vec<FriendRequest>,
    /// Last username search results.
    pub users: Vec<UserProfile>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Friendship edges and pending friend requests.
///
/// All operations are fail-open: a gateway failure is recorded in the state's
/// `error` field and logged, never propagated to the caller. Every operation
/// sets `is_loading` on entry and clears it on completion; concurrent calls
/// are not mutually exclusive.
#[derive(Clone)]
pub struct FriendStore {
    gateway: Arc<dyn Gateway>,
    config: AppConfig,
    state: Arc<Mutex<FriendState>>,
}

impl FriendStore {
    pub fn new(gateway: Arc<dyn Gateway>, config: AppConfig) -> Self {
        Self {
            gateway,
            config,
            state: Arc::new(Mutex::new(FriendState::default())),
        }
    }

    // --- State accessors ---

    pub fn state(&self) -> FriendState {
        self.state.lock().unwrap().clone()
    }

    pub fn friends(&self) -> Vec<FriendEdge> {
        self.state.lock().unwrap().friends.clone()
    }

    pub fn friend_requests(&self) -> Vec<FriendRequest> {
        self.state.lock().unwrap().friend_requests.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().is_loading
    }

    /// Drop every cached row; called on logout.
    pub fn reset(&self) {
        *self.state.lock().unwrap() = FriendState::default();
    }

    fn begin(&self) {
        let mut state = self.state.lock().unwrap();
        state.is_loading = true;
        state.error = None;
    }

    fn done(&self) {
        self.state.lock().unwrap().is_loading = false;
    }

    fn fail(&self, op: &'static str, err: AppError) {
        tracing::error!(op, error = %err, code = err.code(), "friend store operation failed");
        let mut state = self.state.lock().unwrap();
        state.error = Some(err.to_string());
        state.is_loading = false;
    }

    // --- Operations ---

    /// Replace the friends cache with every edge owned by `user_id`.
    pub async fn fetch_friends(&self, user_id: &str) {
        self.begin();
        if user_id.is_empty() {
            self.fail("fetch_friends", AppError::validation("userId is required"));
            return;
        }
        match self
            .gateway
            .query(
                collections::FRIENDS,
                &[Filter::eq("user_id", user_id)],
                None,
                None,
            )
            .await
        {
            Ok(docs) => {
                let friends = decode_all::<FriendEdge>(&docs);
                tracing::debug!(user_id, count = friends.len(), "friends fetched");
                self.state.lock().unwrap().friends = friends;
                self.done();
            }
            Err(err) => self.fail("fetch_friends", err),
        }
    }

    /// Replace the request cache with every pending request addressed to
    /// `user_id`.
    pub async fn fetch_friend_requests(&self, user_id: &str) {
        self.begin();
        if user_id.is_empty() {
            self.fail("fetch_friend_requests", AppError::validation("userId is required"));
            return;
        }
        match self
            .gateway
            .query(
                collections::FRIEND_REQUESTS,
                &[Filter::eq("to", user_id)],
                None,
                None,
            )
            .await
        {
            Ok(docs) => {
                let requests = decode_all::<FriendRequest>(&docs);
                tracing::debug!(user_id, count = requests.len(), "friend requests fetched");
                self.state.lock().unwrap().friend_requests = requests;
                self.done();
            }
            Err(err) => self.fail("fetch_friend_requests", err),
        }
    }

    /// Case-sensitive prefix match on usernames. The range runs from the
    /// query itself to the query plus a highest-codepoint sentinel, so every
    /// username starting with the query falls inside it. Empty on error.
    pub async fn search_users(&self, query: &str) -> Vec<UserProfile> {
        self.begin();
        let query = query.trim();
        if query.is_empty() {
            let mut state = self.state.lock().unwrap();
            state.users.clear();
            state.is_loading = false;
            return Vec::new();
        }
        let filters = [
            Filter::gte("username", query),
            Filter::lte("username", format!("{query}{PREFIX_SENTINEL}")),
        ];
        match self
            .gateway
            .query(
                collections::USERS,
                &filters,
                Some(OrderBy::asc("username")),
                Some(self.config.search_limit),
            )
            .await
        {
            Ok(docs) => {
                let users = decode_all::<UserProfile>(&docs);
                self.state.lock().unwrap().users = users.clone();
                self.done();
                users
            }
            Err(err) => {
                self.fail("search_users", err);
                Vec::new()
            }
        }
    }

    /// Insert one pending request row. The caller is responsible for not
    /// sending a request when an edge or a pending request already exists in
    /// either direction; nothing here deduplicates.
    pub async fn send_friend_request(&self, from: &str, to: &str, from_display_name: &str) {
        self.begin();
        if from.is_empty() || to.is_empty() {
            self.fail("send_friend_request", AppError::validation("from and to are required"));
            return;
        }
        if from == to {
            self.fail(
                "send_friend_request",
                AppError::new(ErrorCode::CannotFriendSelf, "cannot send a friend request to yourself"),
            );
            return;
        }
        let request = fields(json!({
            "from": from,
            "to": to,
            "status": STATUS_PENDING,
            "from_display_name": from_display_name,
        }));
        match self.gateway.insert(collections::FRIEND_REQUESTS, request).await {
            Ok(id) => {
                tracing::info!(from, to, request_id = %id, "friend request sent");
                self.done();
            }
            Err(err) => self.fail("send_friend_request", err),
        }
    }

    /// Accept a pending request from `friend_id`: write both directed edges,
    /// delete every matching pending row, then refresh both caches.
    ///
    /// The two inserts are sequential and not transactional; a failure after
    /// the first one leaves an asymmetric edge behind, which is recorded in
    /// the error field and otherwise left alone.
    pub async fn accept_friend_request(&self, user_id: &str, friend_id: &str) {
        self.begin();
        if user_id.is_empty() || friend_id.is_empty() {
            self.fail("accept_friend_request", AppError::validation("userId and friendId are required"));
            return;
        }
        if user_id == friend_id {
            self.fail(
                "accept_friend_request",
                AppError::new(ErrorCode::CannotFriendSelf, "cannot befriend yourself"),
            );
            return;
        }

        if let Err(err) = self.insert_edge(user_id, friend_id).await {
            self.fail("accept_friend_request", err);
            return;
        }
        if let Err(err) = self.insert_edge(friend_id, user_id).await {
            tracing::warn!(user_id, friend_id, "second edge insert failed; asymmetric edge left behind");
            self.fail("accept_friend_request", err);
            return;
        }
        if let Err(err) = self.delete_pending(friend_id, user_id).await {
            self.fail("accept_friend_request", err);
            return;
        }
        tracing::info!(user_id, friend_id, "friend request accepted");

        self.fetch_friends(user_id).await;
        self.fetch_friend_requests(user_id).await;
    }

    /// Delete every pending row from `friend_id` to `user_id`. A reject with
    /// no matching request is a no-op, not an error.
    pub async fn reject_friend_request(&self, user_id: &str, friend_id: &str) {
        self.begin();
        if user_id.is_empty() || friend_id.is_empty() {
            self.fail("reject_friend_request", AppError::validation("userId and friendId are required"));
            return;
        }
        match self.delete_pending(friend_id, user_id).await {
            Ok(0) => {
                tracing::debug!(user_id, friend_id, "no pending request to reject");
            }
            Ok(deleted) => {
                tracing::info!(user_id, friend_id, deleted, "friend request rejected");
            }
            Err(err) => {
                self.fail("reject_friend_request", err);
                return;
            }
        }
        self.fetch_friend_requests(user_id).await;
    }

    /// Remove both directions of the edge, then refresh the friends cache.
    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) {
        self.begin();
        if user_id.is_empty() || friend_id.is_empty() {
            self.fail("remove_friend", AppError::validation("userId and friendId are required"));
            return;
        }
        for (owner, other) in [(user_id, friend_id), (friend_id, user_id)] {
            if let Err(err) = self.delete_edges(owner, other).await {
                self.fail("remove_friend", err);
                return;
            }
        }
        tracing::info!(user_id, friend_id, "friend removed");
        self.fetch_friends(user_id).await;
    }

    // --- Gateway helpers ---

    async fn insert_edge(&self, user_id: &str, friend_id: &str) -> AppResult<String> {
        self.gateway
            .insert(
                collections::FRIENDS,
                fields(json!({
                    "user_id": user_id,
                    "friend_id": friend_id,
                    "created_at": Utc::now(),
                })),
            )
            .await
    }

    async fn delete_edges(&self, user_id: &str, friend_id: &str) -> AppResult<usize> {
        let docs = self
            .gateway
            .query(
                collections::FRIENDS,
                &[
                    Filter::eq("user_id", user_id),
                    Filter::eq("friend_id", friend_id),
                ],
                None,
                None,
            )
            .await?;
        for doc in &docs {
            self.gateway.delete(collections::FRIENDS, &doc.id).await?;
        }
        Ok(docs.len())
    }

    async fn delete_pending(&self, from: &str, to: &str) -> AppResult<usize> {
        let docs = self
            .gateway
            .query(
                collections::FRIEND_REQUESTS,
                &[
                    Filter::eq("from", from),
                    Filter::eq("to", to),
                    Filter::eq("status", STATUS_PENDING),
                ],
                None,
                None,
            )
            .await?;
        for doc in &docs {
            self.gateway
                .delete(collections::FRIEND_REQUESTS, &doc.id)
                .await?;
        }
        Ok(docs.len())
    }
}
