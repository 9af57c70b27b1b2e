//! Feed pagination, optimistic likes and comment caching for a note feed backend.
//!
//! [`FeedController`] owns the paginated item list, [`CommentStore`] caches
//! comment threads per item, and [`ApiClient`] talks to the REST backend.
//! Rendering is left to whoever subscribes to the controller state.

pub mod client;
pub mod comments;
pub mod config;
pub mod controller;
pub mod drafts;
pub mod error;
pub mod models;

pub use client::{ApiClient, CommentClient, FeedClient};
pub use comments::{display_order, CommentStore, ThreadInfo};
pub use config::Config;
pub use controller::{FeedController, FeedState, LoadOutcome};
pub use drafts::{compose_comment, DraftStore};
pub use error::{ClientError, ConfigError, DraftError};
pub use models::{Comment, CommentId, CommentPage, Item, ItemId};
