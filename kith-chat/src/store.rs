use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use kith_shared::collections;
use kith_shared::config::AppConfig;
use kith_shared::errors::AppError;
use kith_shared::gateway::{
    decode_all, fields, Filter, Gateway, OrderBy, SnapshotHandler, Subscription,
};

use crate::models::{Conversation, Message};

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    /// Conversations the session user participates in, most recent first.
    pub conversations: Vec<Conversation>,
    /// The conversation whose message thread is currently live.
    pub current: Option<Conversation>,
    /// Messages of the current thread, oldest first, bounded window.
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Conversation discovery/creation and per-conversation live message
/// streams.
///
/// Two long-lived subscriptions at most: the conversation list and the
/// selected thread. Selecting a new thread cancels the prior thread handle
/// before opening the next one; stacking listeners would have each push
/// fighting over the same message list.
#[derive(Clone)]
pub struct ChatStore {
    gateway: Arc<dyn Gateway>,
    config: AppConfig,
    state: Arc<Mutex<ChatState>>,
    list_sub: Arc<Mutex<Option<Subscription>>>,
    thread_sub: Arc<Mutex<Option<Subscription>>>,
}

impl ChatStore {
    pub fn new(gateway: Arc<dyn Gateway>, config: AppConfig) -> Self {
        Self {
            gateway,
            config,
            state: Arc::new(Mutex::new(ChatState::default())),
            list_sub: Arc::new(Mutex::new(None)),
            thread_sub: Arc::new(Mutex::new(None)),
        }
    }

    // --- State accessors ---

    pub fn state(&self) -> ChatState {
        self.state.lock().unwrap().clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().unwrap().conversations.clone()
    }

    pub fn current(&self) -> Option<Conversation> {
        self.state.lock().unwrap().current.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Cancel both subscriptions and drop all cached chat state; the
    /// unmount/logout path.
    pub fn close(&self) {
        if let Some(sub) = self.list_sub.lock().unwrap().take() {
            sub.cancel();
        }
        if let Some(sub) = self.thread_sub.lock().unwrap().take() {
            sub.cancel();
        }
        *self.state.lock().unwrap() = ChatState::default();
    }

    fn fail(&self, op: &'static str, err: AppError) {
        tracing::error!(op, error = %err, code = err.code(), "chat store operation failed");
        let mut state = self.state.lock().unwrap();
        state.error = Some(err.to_string());
        state.is_loading = false;
    }

    // --- Conversation list ---

    /// Watch every conversation `user_id` participates in, most recent
    /// first. Replaces any prior list subscription.
    pub fn watch_conversations(&self, user_id: &str) {
        if let Some(prev) = self.list_sub.lock().unwrap().take() {
            prev.cancel();
        }
        self.state.lock().unwrap().is_loading = true;

        let state = self.state.clone();
        let handler: SnapshotHandler = Arc::new(move |docs| {
            let conversations = decode_all::<Conversation>(&docs);
            let mut state = state.lock().unwrap();
            state.conversations = conversations;
            state.is_loading = false;
        });

        let sub = self.gateway.subscribe(
            collections::CONVERSATIONS,
            &[Filter::array_contains("participants", user_id)],
            Some(OrderBy::desc("last_message_time")),
            Some(self.config.conversation_window),
            handler,
        );
        *self.list_sub.lock().unwrap() = Some(sub);
        tracing::debug!(user_id, "conversation list subscription established");
    }

    // --- Conversation discovery/creation ---

    /// Find or create the conversation for an unordered participant pair,
    /// then select it.
    ///
    /// The pair is sorted into its canonical order and looked up with an
    /// equality match, so either participant resolves the same document.
    /// The check-then-insert is not atomic against a concurrent identical
    /// call from the other side; both may observe "not found" and insert
    /// duplicates. That race is inherent to the design and left as is.
    pub async fn start_conversation(
        &self,
        self_id: &str,
        self_name: &str,
        friend_id: &str,
        friend_name: &str,
    ) -> Option<Conversation> {
        self.state.lock().unwrap().is_loading = true;
        if self_id.is_empty() || friend_id.is_empty() || self_name.is_empty() || friend_name.is_empty() {
            self.fail(
                "start_conversation",
                AppError::validation("both participant ids and display names are required"),
            );
            return None;
        }

        let participants = Conversation::canonical_pair(self_id, friend_id);
        let existing = match self
            .gateway
            .query(
                collections::CONVERSATIONS,
                &[Filter::eq("participants", json!(participants))],
                None,
                Some(1),
            )
            .await
        {
            Ok(docs) => docs.first().and_then(|doc| doc.decode::<Conversation>().ok()),
            Err(err) => {
                self.fail("start_conversation", err);
                return None;
            }
        };

        if let Some(conversation) = existing {
            tracing::debug!(conversation_id = %conversation.id, "existing conversation selected");
            self.select_conversation(conversation.clone());
            self.state.lock().unwrap().is_loading = false;
            return Some(conversation);
        }

        let mut participant_names = [self_name.to_string(), friend_name.to_string()];
        participant_names.sort();
        let last_message_time = Utc::now();
        let doc = fields(json!({
            "participants": participants,
            "participant_names": participant_names,
            "last_message": None::<String>,
            "last_message_time": last_message_time,
        }));
        match self.gateway.insert(collections::CONVERSATIONS, doc).await {
            Ok(id) => {
                tracing::info!(conversation_id = %id, "conversation created");
                let conversation = Conversation {
                    id,
                    participants: participants.to_vec(),
                    participant_names: participant_names.to_vec(),
                    last_message: None,
                    last_message_time,
                };
                self.select_conversation(conversation.clone());
                self.state.lock().unwrap().is_loading = false;
                Some(conversation)
            }
            Err(err) => {
                self.fail("start_conversation", err);
                None
            }
        }
    }

    // --- Message thread ---

    /// Make `conversation` the current thread: cancel the prior thread
    /// subscription, then watch this conversation's messages. The window is
    /// the most recent N, delivered oldest first.
    pub fn select_conversation(&self, conversation: Conversation) {
        if let Some(prev) = self.thread_sub.lock().unwrap().take() {
            prev.cancel();
        }
        {
            let mut state = self.state.lock().unwrap();
            state.current = Some(conversation.clone());
            state.messages.clear();
        }

        let state = self.state.clone();
        let handler: SnapshotHandler = Arc::new(move |docs| {
            // Subscribed newest-first to get the most recent window; the
            // thread itself reads oldest-first.
            let mut messages = decode_all::<Message>(&docs);
            messages.reverse();
            state.lock().unwrap().messages = messages;
        });

        let sub = self.gateway.subscribe(
            collections::MESSAGES,
            &[Filter::eq("conversation_id", conversation.id.as_str())],
            Some(OrderBy::desc("created_at")),
            Some(self.config.message_window),
            handler,
        );
        *self.thread_sub.lock().unwrap() = Some(sub);
        tracing::debug!(conversation_id = %conversation.id, "message thread subscription established");
    }

    /// Append a message, then refresh the parent conversation's preview
    /// fields. The two writes are independent: if the preview update fails
    /// after the insert succeeded, the message stands and the preview is
    /// stale until the next send.
    pub async fn send_message(&self, conversation_id: &str, sender_id: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if conversation_id.is_empty() || sender_id.is_empty() {
            self.fail(
                "send_message",
                AppError::validation("conversationId and senderId are required"),
            );
            return;
        }

        let created_at = Utc::now();
        let message = fields(json!({
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "text": text,
            "created_at": created_at,
        }));
        if let Err(err) = self.gateway.insert(collections::MESSAGES, message).await {
            self.fail("send_message", err);
            return;
        }

        let preview = fields(json!({
            "last_message": text,
            "last_message_time": created_at,
        }));
        if let Err(err) = self
            .gateway
            .update(collections::CONVERSATIONS, conversation_id, preview)
            .await
        {
            // Message is in; only the preview is stale. Self-heals on the
            // next send.
            self.fail("send_message", err);
        }
    }
}
