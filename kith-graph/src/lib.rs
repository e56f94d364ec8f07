//! Social graph store: friendship edges, pending friend requests, profiles,
//! and username search.
//!
//! A confirmed friendship is denormalized as two directed rows, `(A,B)` and
//! `(B,A)`, written as a pair on accept and removed as a pair on unfriend.
//! The multi-row writes are best-effort: a failure between the two inserts
//! leaves an asymmetric edge, which is surfaced through the store's error
//! field rather than compensated.

pub mod friends;
pub mod models;
pub mod profile;

pub use friends::{FriendState, FriendStore};
pub use models::{FriendEdge, FriendRequest, NewProfile, UpdateProfile, UserProfile};
pub use profile::{ProfileState, ProfileStore};
