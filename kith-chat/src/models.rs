use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A two-party conversation. Participants are stored as a canonically
/// sorted pair so either side's lookup matches the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    pub participant_names: Vec<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    pub last_message_time: DateTime<Utc>,
}

impl Conversation {
    /// The canonical key for an unordered participant pair.
    pub fn canonical_pair(a: &str, b: &str) -> [String; 2] {
        let mut pair = [a.to_string(), b.to_string()];
        pair.sort();
        pair
    }

    /// Display name of the participant that is not `user_id`'s.
    pub fn partner_name(&self, own_name: &str) -> Option<&str> {
        self.participant_names
            .iter()
            .map(String::as_str)
            .find(|name| *name != own_name)
    }
}

/// Append-only message, ordered by timestamp ascending within its
/// conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
