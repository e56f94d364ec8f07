use std::sync::{Arc, Mutex};

use serde_json::json;

use kith_shared::collections;
use kith_shared::errors::AppError;
use kith_shared::gateway::{
    decode_all, fields, Filter, Gateway, SnapshotHandler, Subscription,
};

use crate::models::{NewNotification, Notification};

#[derive(Debug, Clone, Default)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Live inbox scoped to one recipient.
#[derive(Clone)]
pub struct NotificationStore {
    gateway: Arc<dyn Gateway>,
    state: Arc<Mutex<NotificationState>>,
    inbox_sub: Arc<Mutex<Option<Subscription>>>,
}

impl NotificationStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            state: Arc::new(Mutex::new(NotificationState::default())),
            inbox_sub: Arc::new(Mutex::new(None)),
        }
    }

    // --- State accessors ---

    pub fn state(&self) -> NotificationState {
        self.state.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Cancel the inbox subscription and drop cached notifications.
    pub fn reset(&self) {
        if let Some(sub) = self.inbox_sub.lock().unwrap().take() {
            sub.cancel();
        }
        *self.state.lock().unwrap() = NotificationState::default();
    }

    fn fail(&self, op: &'static str, err: AppError) {
        tracing::error!(op, error = %err, code = err.code(), "notification store operation failed");
        let mut state = self.state.lock().unwrap();
        state.error = Some(err.to_string());
        state.is_loading = false;
    }

    // --- Operations ---

    /// Watch `recipient_id`'s inbox, replacing any prior subscription.
    pub fn watch_notifications(&self, recipient_id: &str) {
        if let Some(prev) = self.inbox_sub.lock().unwrap().take() {
            prev.cancel();
        }
        self.state.lock().unwrap().is_loading = true;

        let state = self.state.clone();
        let handler: SnapshotHandler = Arc::new(move |docs| {
            let notifications = decode_all::<Notification>(&docs);
            let mut state = state.lock().unwrap();
            state.notifications = notifications;
            state.is_loading = false;
        });

        let sub = self.gateway.subscribe(
            collections::NOTIFICATIONS,
            &[Filter::eq("recipient_id", recipient_id)],
            None,
            None,
            handler,
        );
        *self.inbox_sub.lock().unwrap() = Some(sub);
        tracing::debug!(recipient_id, "notification subscription established");
    }

    /// Insert a new (unread) notification for its recipient.
    pub async fn add_notification(&self, notification: NewNotification) {
        if notification.recipient_id.is_empty() {
            self.fail("add_notification", AppError::validation("recipientId is required"));
            return;
        }
        let doc = fields(json!({
            "recipient_id": notification.recipient_id,
            "sender_id": notification.sender_id,
            "sender_name": notification.sender_name,
            "kind": notification.kind,
            "message": notification.message,
            "read": false,
        }));
        match self.gateway.insert(collections::NOTIFICATIONS, doc).await {
            Ok(id) => {
                tracing::debug!(notification_id = %id, "notification created");
            }
            Err(err) => self.fail("add_notification", err),
        }
    }

    pub async fn mark_as_read(&self, notification_id: &str) {
        if let Err(err) = self
            .gateway
            .update(
                collections::NOTIFICATIONS,
                notification_id,
                fields(json!({ "read": true })),
            )
            .await
        {
            self.fail("mark_as_read", err);
        }
    }

    /// Bulk read flag: query the recipient's unread rows and update each.
    pub async fn mark_all_as_read(&self, recipient_id: &str) {
        let unread = match self
            .gateway
            .query(
                collections::NOTIFICATIONS,
                &[
                    Filter::eq("recipient_id", recipient_id),
                    Filter::eq("read", false),
                ],
                None,
                None,
            )
            .await
        {
            Ok(docs) => docs,
            Err(err) => {
                self.fail("mark_all_as_read", err);
                return;
            }
        };
        for doc in &unread {
            if let Err(err) = self
                .gateway
                .update(
                    collections::NOTIFICATIONS,
                    &doc.id,
                    fields(json!({ "read": true })),
                )
                .await
            {
                self.fail("mark_all_as_read", err);
                return;
            }
        }
        tracing::debug!(recipient_id, updated = unread.len(), "marked all notifications read");
    }

    /// Hard delete; the terminal step once a notification has been acted
    /// upon or dismissed.
    pub async fn delete_notification(&self, notification_id: &str) {
        if let Err(err) = self
            .gateway
            .delete(collections::NOTIFICATIONS, notification_id)
            .await
        {
            self.fail("delete_notification", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use kith_shared::gateway::MemoryGateway;

    fn setup() -> (MemoryGateway, NotificationStore) {
        let gw = MemoryGateway::new();
        let store = NotificationStore::new(Arc::new(gw.clone()));
        (gw, store)
    }

    #[tokio::test]
    async fn inbox_is_scoped_to_the_recipient() {
        let (_gw, store) = setup();
        store.watch_notifications("B");

        store
            .add_notification(NewNotification::friend_request("B", "A", "alice"))
            .await;
        store
            .add_notification(NewNotification::generic("C", "A", "alice", "hello C"))
            .await;

        let inbox = store.notifications();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].recipient_id, "B");
        assert_eq!(inbox[0].kind, NotificationKind::FriendRequest);
        assert!(!inbox[0].read);
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn mark_as_read_flips_one_flag() {
        let (_gw, store) = setup();
        store.watch_notifications("B");
        store
            .add_notification(NewNotification::friend_request("B", "A", "alice"))
            .await;
        store
            .add_notification(NewNotification::generic("B", "C", "carol", "hey"))
            .await;

        let first = store.notifications()[0].id.clone();
        store.mark_as_read(&first).await;

        assert_eq!(store.unread_count(), 1);
        let read_flags: Vec<bool> = store.notifications().iter().map(|n| n.read).collect();
        assert_eq!(read_flags.iter().filter(|r| **r).count(), 1);
    }

    #[tokio::test]
    async fn mark_all_as_read_clears_the_counter() {
        let (_gw, store) = setup();
        store.watch_notifications("B");
        for n in 0..3 {
            store
                .add_notification(NewNotification::generic("B", "A", "alice", format!("m{n}")))
                .await;
        }
        assert_eq!(store.unread_count(), 3);

        store.mark_all_as_read("B").await;
        assert_eq!(store.error(), None);
        assert_eq!(store.unread_count(), 0);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (gw, store) = setup();
        store.watch_notifications("B");
        store
            .add_notification(NewNotification::friend_request("B", "A", "alice"))
            .await;
        let id = store.notifications()[0].id.clone();

        store.delete_notification(&id).await;
        assert_eq!(store.error(), None);
        assert!(store.notifications().is_empty());
        assert_eq!(gw.count(collections::NOTIFICATIONS), 0);
    }

    #[tokio::test]
    async fn gateway_failure_is_recorded() {
        let (gw, store) = setup();
        gw.set_fail_writes(true);
        store
            .add_notification(NewNotification::friend_request("B", "A", "alice"))
            .await;
        assert!(store.error().is_some());
    }
}
