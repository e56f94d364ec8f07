//! Collection names shared by every store.
//!
//! The remote gateway addresses documents by collection + id; these constants
//! keep the stores and the tests pointing at the same names.

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const FRIENDS: &str = "friends";
pub const FRIEND_REQUESTS: &str = "friend_requests";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";
pub const NOTIFICATIONS: &str = "notifications";
