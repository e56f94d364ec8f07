//! Per-session client context.
//!
//! One `Client` is constructed at session start and passed to whatever needs
//! it; there is no ambient global state. It owns the session handle and one
//! instance of each store, all sharing a single gateway. Signing out cancels
//! every live subscription and resets every cache.
//!
//! The controller-level couplings live here too: consuming a friend-request
//! notification spans the graph store and the notification store, and
//! neither store knows about the other.

use std::sync::Arc;

use kith_chat::ChatStore;
use kith_feed::FeedStore;
use kith_graph::{FriendStore, ProfileStore, UserProfile};
use kith_notify::{NewNotification, Notification, NotificationKind, NotificationStore};
use kith_session::{AuthUser, Session};
use kith_shared::config::AppConfig;
use kith_shared::gateway::Gateway;

pub use kith_session::AuthUser as User;

#[derive(Clone)]
pub struct Client {
    session: Session,
    profiles: ProfileStore,
    friends: FriendStore,
    feed: FeedStore,
    chat: ChatStore,
    notifications: NotificationStore,
}

impl Client {
    pub fn new(gateway: Arc<dyn Gateway>, config: AppConfig) -> Self {
        let session = Session::new();
        Self {
            profiles: ProfileStore::new(gateway.clone(), session.clone()),
            friends: FriendStore::new(gateway.clone(), config.clone()),
            feed: FeedStore::new(gateway.clone(), session.clone(), config.clone()),
            chat: ChatStore::new(gateway.clone(), config),
            notifications: NotificationStore::new(gateway),
            session,
        }
    }

    // --- Accessors ---

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn friends(&self) -> &FriendStore {
        &self.friends
    }

    pub fn feed(&self) -> &FeedStore {
        &self.feed
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    // --- Session lifecycle ---

    pub fn sign_in(&self, user: AuthUser) {
        self.session.sign_in(user);
    }

    /// End the session: cancel every live subscription and drop every
    /// cached row before clearing the identity.
    pub fn sign_out(&self) {
        self.feed.reset();
        self.chat.close();
        self.notifications.reset();
        self.friends.reset();
        self.profiles.reset();
        self.session.sign_out();
        tracing::info!("client session reset");
    }

    // --- Controller-level couplings ---

    /// Send a friend request and raise the matching notification in the
    /// recipient's inbox.
    pub async fn send_friend_request(&self, to: &UserProfile) {
        let me = match self.session.require_user() {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(error = %err, "friend request without a session user");
                return;
            }
        };
        self.friends
            .send_friend_request(&me.id, &to.user_id, &me.display_name)
            .await;
        if self.friends.error().is_some() {
            return; // request did not land; no notification to raise
        }
        self.notifications
            .add_notification(NewNotification::friend_request(
                &to.user_id,
                &me.id,
                &me.display_name,
            ))
            .await;
    }

    /// Consume a friend-request notification: accept or reject the request,
    /// then delete the notification. Non-friend-request notifications are
    /// left untouched.
    pub async fn respond_to_friend_request(&self, notification: &Notification, accept: bool) {
        if notification.kind != NotificationKind::FriendRequest {
            tracing::warn!(notification_id = %notification.id, "not a friend-request notification");
            return;
        }
        if accept {
            self.friends
                .accept_friend_request(&notification.recipient_id, &notification.sender_id)
                .await;
        } else {
            self.friends
                .reject_friend_request(&notification.recipient_id, &notification.sender_id)
                .await;
        }
        if self.friends.error().is_some() {
            return; // leave the notification for a retry
        }
        self.notifications
            .delete_notification(&notification.id)
            .await;
    }
}
