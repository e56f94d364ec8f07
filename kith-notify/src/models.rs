use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub kind: NotificationKind,
    pub message: String,
}

impl NewNotification {
    pub fn friend_request(
        recipient_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        let sender_name = sender_name.into();
        Self {
            recipient_id: recipient_id.into(),
            sender_id: sender_id.into(),
            message: format!("{sender_name} sent you a friend request"),
            sender_name,
            kind: NotificationKind::FriendRequest,
        }
    }

    pub fn generic(
        recipient_id: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            kind: NotificationKind::Generic,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::FriendRequest).unwrap();
        assert_eq!(json, "\"friend_request\"");
        let parsed: NotificationKind = serde_json::from_str("\"generic\"").unwrap();
        assert_eq!(parsed, NotificationKind::Generic);
    }

    #[test]
    fn friend_request_constructor_fills_the_message() {
        let n = NewNotification::friend_request("B", "A", "alice");
        assert_eq!(n.kind, NotificationKind::FriendRequest);
        assert_eq!(n.message, "alice sent you a friend request");
    }
}
