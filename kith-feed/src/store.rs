use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use kith_session::Session;
use kith_shared::collections;
use kith_shared::config::AppConfig;
use kith_shared::errors::{AppError, AppResult, ErrorCode};
use kith_shared::gateway::{
    decode_all, fields, Gateway, OrderBy, SnapshotHandler, Subscription,
};

use crate::models::{Comment, NewPost, Post, UpdatePost};

#[derive(Debug, Clone, Default)]
pub struct FeedState {
    /// Newest first, as delivered by the feed subscription.
    pub posts: Vec<Post>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Post feed: one live subscription plus optimistic mutations.
///
/// Policy (applied uniformly): every mutation touches the local cache first
/// and reverts the exact change on failure; the subscription's next push is
/// authoritative and overwrites whatever optimistic state is in place.
#[derive(Clone)]
pub struct FeedStore {
    gateway: Arc<dyn Gateway>,
    session: Session,
    config: AppConfig,
    state: Arc<Mutex<FeedState>>,
    feed_sub: Arc<Mutex<Option<Subscription>>>,
}

impl FeedStore {
    pub fn new(gateway: Arc<dyn Gateway>, session: Session, config: AppConfig) -> Self {
        Self {
            gateway,
            session,
            config,
            state: Arc::new(Mutex::new(FeedState::default())),
            feed_sub: Arc::new(Mutex::new(None)),
        }
    }

    // --- State accessors ---

    pub fn state(&self) -> FeedState {
        self.state.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn post(&self, post_id: &str) -> Option<Post> {
        self.state
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().is_loading
    }

    /// Cancel the live subscription and drop all cached posts.
    pub fn reset(&self) {
        if let Some(sub) = self.feed_sub.lock().unwrap().take() {
            sub.cancel();
        }
        *self.state.lock().unwrap() = FeedState::default();
    }

    fn fail(&self, op: &'static str, err: AppError) {
        tracing::error!(op, error = %err, code = err.code(), "feed store operation failed");
        let mut state = self.state.lock().unwrap();
        state.error = Some(err.to_string());
        state.is_loading = false;
    }

    // --- Live feed ---

    /// Establish (or reuse) the live feed subscription, newest first. Every
    /// push replaces the full post list and recomputes `is_liked` against
    /// the current session user.
    pub fn fetch_posts(&self) {
        let mut guard = self.feed_sub.lock().unwrap();
        if guard.is_some() {
            return; // feed is already live
        }
        self.state.lock().unwrap().is_loading = true;

        let state = self.state.clone();
        let session = self.session.clone();
        let handler: SnapshotHandler = Arc::new(move |docs| {
            let uid = session.user_id();
            let mut posts = decode_all::<Post>(&docs);
            for post in &mut posts {
                post.is_liked = uid
                    .as_deref()
                    .map(|u| post.likes.iter().any(|l| l == u))
                    .unwrap_or(false);
            }
            let mut state = state.lock().unwrap();
            state.posts = posts;
            state.is_loading = false;
        });

        *guard = Some(self.gateway.subscribe(
            collections::POSTS,
            &[],
            Some(OrderBy::desc("created_at")),
            Some(self.config.feed_limit),
            handler,
        ));
        tracing::debug!("feed subscription established");
    }

    // --- Mutations ---

    /// Create a post. An attached image is uploaded first; the post is
    /// prepended optimistically and removed again if the insert fails.
    pub async fn create_post(&self, post: NewPost) {
        self.state.lock().unwrap().is_loading = true;
        let me = match self.session.require_user() {
            Ok(user) => user,
            Err(err) => {
                self.fail("create_post", err);
                return;
            }
        };
        if let Err(err) = post.validate() {
            self.fail("create_post", AppError::validation(err.to_string()));
            return;
        }
        let caption = post
            .caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if caption.is_none() && post.image.is_none() {
            self.fail(
                "create_post",
                AppError::new(ErrorCode::EmptyPost, "a post needs a caption or an image"),
            );
            return;
        }

        let image = match &post.image {
            Some(bytes) => {
                let path = format!("posts/{}", Utc::now().timestamp_millis());
                match self.gateway.upload_blob(&path, bytes).await {
                    Ok(url) => Some(url),
                    Err(err) => {
                        self.fail(
                            "create_post",
                            AppError::new(ErrorCode::ImageUploadFailed, err.to_string()),
                        );
                        return;
                    }
                }
            }
            None => None,
        };

        let created_at = Utc::now();
        let local_id = format!("pending-{}", Uuid::new_v4());
        {
            let mut state = self.state.lock().unwrap();
            state.posts.insert(
                0,
                Post {
                    id: local_id.clone(),
                    user: me.id.clone(),
                    caption: caption.clone(),
                    image: image.clone(),
                    created_at,
                    likes: Vec::new(),
                    comments: Vec::new(),
                    is_liked: false,
                },
            );
        }

        let doc = fields(json!({
            "user": me.id,
            "caption": caption,
            "image": image,
            "created_at": created_at,
            "likes": [],
            "comments": [],
        }));
        match self.gateway.insert(collections::POSTS, doc).await {
            Ok(id) => {
                tracing::info!(post_id = %id, user_id = %me.id, "post created");
                let mut state = self.state.lock().unwrap();
                state.posts.retain(|p| p.id != local_id);
                // If the subscription push has not landed yet, reconcile the
                // optimistic entry with the real id ourselves.
                if !state.posts.iter().any(|p| p.id == id) {
                    state.posts.insert(
                        0,
                        Post {
                            id,
                            user: me.id,
                            caption,
                            image,
                            created_at,
                            likes: Vec::new(),
                            comments: Vec::new(),
                            is_liked: false,
                        },
                    );
                }
                state.is_loading = false;
            }
            Err(err) => {
                self.state
                    .lock()
                    .unwrap()
                    .posts
                    .retain(|p| p.id != local_id);
                self.fail("create_post", err);
            }
        }
    }

    pub async fn like_post(&self, post_id: &str) {
        self.toggle_like(post_id, true).await;
    }

    pub async fn unlike_post(&self, post_id: &str) {
        self.toggle_like(post_id, false).await;
    }

    /// Optimistic set add/remove of the session user in the likes set, then
    /// a read-modify-write against the gateway. Set semantics make both
    /// directions idempotent; on failure the exact prior entry is restored.
    async fn toggle_like(&self, post_id: &str, like: bool) {
        let op = if like { "like_post" } else { "unlike_post" };
        let me = match self.session.require_user() {
            Ok(user) => user,
            Err(err) => {
                self.fail(op, err);
                return;
            }
        };

        let prev = {
            let mut state = self.state.lock().unwrap();
            state.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
                let prev = post.clone();
                if like {
                    if !post.likes.contains(&me.id) {
                        post.likes.push(me.id.clone());
                    }
                } else {
                    post.likes.retain(|l| l != &me.id);
                }
                post.is_liked = like;
                prev
            })
        };

        let result: AppResult<()> = async {
            let remote: Post = self
                .gateway
                .get(collections::POSTS, post_id)
                .await?
                .decode()?;
            let mut likes = remote.likes;
            if like {
                if !likes.contains(&me.id) {
                    likes.push(me.id.clone());
                }
            } else {
                likes.retain(|l| l != &me.id);
            }
            self.gateway
                .update(
                    collections::POSTS,
                    post_id,
                    fields(json!({ "likes": likes })),
                )
                .await
        }
        .await;

        if let Err(err) = self.restore_on_err(result, post_id, prev) {
            self.fail(op, err);
        }
    }

    /// Owner-edited fields. Ownership is the caller's concern; the store
    /// applies the merge optimistically and reverts it on failure.
    pub async fn update_post(&self, post_id: &str, changes: UpdatePost) {
        self.state.lock().unwrap().is_loading = true;
        if let Err(err) = changes.validate() {
            self.fail("update_post", AppError::validation(err.to_string()));
            return;
        }

        let mut partial = serde_json::Map::new();
        if let Some(caption) = &changes.caption {
            partial.insert("caption".into(), json!(caption));
        }
        if let Some(image) = &changes.image {
            partial.insert("image".into(), json!(image));
        }
        if partial.is_empty() {
            self.state.lock().unwrap().is_loading = false;
            return;
        }

        let prev = {
            let mut state = self.state.lock().unwrap();
            state.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
                let prev = post.clone();
                if let Some(caption) = &changes.caption {
                    post.caption = Some(caption.clone());
                }
                if let Some(image) = &changes.image {
                    post.image = Some(image.clone());
                }
                prev
            })
        };

        let result = self.gateway.update(collections::POSTS, post_id, partial).await;
        match self.restore_on_err(result, post_id, prev) {
            Ok(()) => self.state.lock().unwrap().is_loading = false,
            Err(err) => self.fail("update_post", err),
        }
    }

    /// Optimistic removal; the entry is restored in place if the delete
    /// fails.
    pub async fn delete_post(&self, post_id: &str) {
        self.state.lock().unwrap().is_loading = true;

        let removed = {
            let mut state = self.state.lock().unwrap();
            state
                .posts
                .iter()
                .position(|p| p.id == post_id)
                .map(|index| (index, state.posts.remove(index)))
        };

        match self.gateway.delete(collections::POSTS, post_id).await {
            Ok(()) => {
                tracing::info!(post_id, "post deleted");
                self.state.lock().unwrap().is_loading = false;
            }
            Err(err) => {
                if let Some((index, post)) = removed {
                    let mut state = self.state.lock().unwrap();
                    let index = index.min(state.posts.len());
                    state.posts.insert(index, post);
                }
                self.fail("delete_post", err);
            }
        }
    }

    /// Append a comment authored by the session user.
    pub async fn comment_on_post(&self, post_id: &str, content: &str) {
        self.state.lock().unwrap().is_loading = true;
        let me = match self.session.require_user() {
            Ok(user) => user,
            Err(err) => {
                self.fail("comment_on_post", err);
                return;
            }
        };
        let content = content.trim();
        if content.is_empty() {
            self.fail("comment_on_post", AppError::validation("comment is empty"));
            return;
        }

        let comment = Comment {
            author: me.id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let prev = {
            let mut state = self.state.lock().unwrap();
            state.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
                let prev = post.clone();
                post.comments.push(comment.clone());
                prev
            })
        };

        let result: AppResult<()> = async {
            let remote: Post = self
                .gateway
                .get(collections::POSTS, post_id)
                .await?
                .decode()?;
            let mut comments = remote.comments;
            comments.push(comment);
            self.gateway
                .update(
                    collections::POSTS,
                    post_id,
                    fields(json!({ "comments": comments })),
                )
                .await
        }
        .await;

        match self.restore_on_err(result, post_id, prev) {
            Ok(()) => self.state.lock().unwrap().is_loading = false,
            Err(err) => self.fail("comment_on_post", err),
        }
    }

    /// On failure, put the captured prior entry back so local state is
    /// exactly what it was before the optimistic mutation.
    fn restore_on_err(
        &self,
        result: AppResult<()>,
        post_id: &str,
        prev: Option<Post>,
    ) -> AppResult<()> {
        if result.is_err() {
            if let Some(prev) = prev {
                let mut state = self.state.lock().unwrap();
                if let Some(slot) = state.posts.iter_mut().find(|p| p.id == post_id) {
                    *slot = prev;
                }
            }
        }
        result
    }
}
