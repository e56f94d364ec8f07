//! Notification store: a live inbox of actionable events.
//!
//! Notifications are created by whatever action targets the recipient (for
//! example, sending a friend request), deleted once consumed or dismissed,
//! and carry a read flag settable individually or in bulk.

pub mod models;
pub mod store;

pub use models::{NewNotification, Notification, NotificationKind};
pub use store::{NotificationState, NotificationStore};
