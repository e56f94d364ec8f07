//! Feed store: the live post feed and its optimistic mutations.
//!
//! One subscription delivers the whole feed, newest first; every mutation
//! (create, like, unlike, comment, edit, delete) applies locally first and
//! reverts the exact change if the gateway call fails. Pushes from the
//! subscription are authoritative and may overwrite optimistic state.

pub mod models;
pub mod store;

pub use models::{Comment, NewPost, Post, UpdatePost};
pub use store::{FeedState, FeedStore};
