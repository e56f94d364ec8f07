use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Owning user id.
    pub user: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Liking user ids; set semantics, a user id appears at most once.
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Derived, never stored: current session user ∈ likes.
    #[serde(skip)]
    pub is_liked: bool,
}

/// Inbound payload for `create_post`. Caption is optional only when an image
/// is attached.
#[derive(Debug, Clone, Default, Validate)]
pub struct NewPost {
    #[validate(length(max = 2000))]
    pub caption: Option<String>,
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePost {
    #[validate(length(max = 2000))]
    pub caption: Option<String>,
    pub image: Option<String>,
}
