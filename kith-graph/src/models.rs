use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request rows only ever carry this status; accept and reject both delete
/// the row instead of flipping it.
pub const STATUS_PENDING: &str = "pending";

// --- Friendship edge ---

/// One directed friendship row. A confirmed friendship is exactly two of
/// these, one per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendEdge {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub created_at: DateTime<Utc>,
}

// --- Friend request ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub from: String,
    pub to: String,
    pub status: String,
    /// Display name of the requester, denormalized so the recipient can
    /// render the request without a profile lookup.
    pub from_display_name: String,
}

// --- User profile ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// Denormalized follower set; mutated by `follow_user` from other users,
    /// everything else by the owner only.
    #[serde(default)]
    pub followers: Vec<String>,
}

impl UserProfile {
    pub fn followers_count(&self) -> usize {
        self.followers.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProfile {
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 280))]
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 3, max = 30))]
    pub username: Option<String>,
    #[validate(length(max = 280))]
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}
