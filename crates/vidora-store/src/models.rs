//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Viewer identity
// ---------------------------------------------------------------------------

/// The identity a request is performed under.
///
/// Anonymous callers and callers whose credential failed verification are
/// both `Anonymous`; only a credential that verified to a known user id
/// yields `Verified`.  Matching on this instead of threading an
/// `Option<Uuid>` keeps the anonymous branches exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Verified(Uuid),
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account.  `subscribers` is denormalized and always equals the number of
/// `subscriptions` rows pointing at this user; the two are only ever mutated
/// together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Unique handle, stored lowercase.
    pub handle: String,
    /// Unique email address.
    pub email: String,
    /// Human-readable display name.
    pub display_name: String,
    /// PHC-format password hash.  Never serialized to the wire.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Locator of the avatar image in the media store.
    pub avatar_url: String,
    /// Storage id of the avatar, usable for later deletion.
    pub avatar_media_id: String,
    /// Optional cover image locator.
    pub cover_url: Option<String>,
    /// Storage id of the cover image.
    pub cover_media_id: Option<String>,
    /// Denormalized subscriber count.
    pub subscribers: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// One uploaded media asset, owned by exactly one uploader.
///
/// `likes` / `dislikes` are denormalized over the `reactions` table and only
/// ever mutated in the same transaction as the reaction row itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Video {
    /// Unique video identifier.
    pub id: Uuid,
    /// Owner.  Immutable after creation.
    pub uploader_id: Uuid,
    pub title: String,
    pub description: String,
    /// Free-text category label.
    pub category: String,
    /// Ordered tag list, stored as a JSON column.
    pub tags: Vec<String>,
    /// Locator of the media file in the media store.
    pub media_url: String,
    /// Storage id of the media file, usable for later deletion.
    pub media_id: String,
    /// Locator of the thumbnail image.
    pub thumbnail_url: String,
    /// Storage id of the thumbnail.
    pub thumbnail_id: String,
    /// Monotonic view counter.
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-editable video metadata, applied by [`Database::update_video`].
///
/// [`Database::update_video`]: crate::Database::update_video
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Replacement thumbnail (locator, storage id).  The caller is
    /// responsible for releasing the previous thumbnail object.
    pub thumbnail: Option<(String, String)>,
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// A viewer's reaction to a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

/// Result of a reaction state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The viewer had no reaction; one was recorded.
    Applied,
    /// The viewer had the opposite reaction; it was flipped.
    Switched,
    /// The viewer already had this reaction; nothing changed.
    Unchanged,
}

// ---------------------------------------------------------------------------
// Joined read models
// ---------------------------------------------------------------------------

/// The slice of an uploader profile joined into lists of videos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploaderSummary {
    pub handle: String,
    pub avatar_url: String,
}

/// A video with its uploader's handle and avatar joined in, as returned by
/// feeds and listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedVideo {
    #[serde(flatten)]
    pub video: Video,
    pub uploader: UploaderSummary,
}

/// Uploader profile joined into the watch page, including the denormalized
/// subscriber count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploaderProfile {
    pub handle: String,
    pub avatar_url: String,
    pub subscribers: i64,
}

/// Everything the watch page needs for one video.
///
/// Only the three derived booleans are exposed; the raw reaction and
/// subscription memberships never leave the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchPage {
    #[serde(flatten)]
    pub video: Video,
    pub uploader: UploaderProfile,
    pub liked: bool,
    pub disliked: bool,
    pub subscribed: bool,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment on a video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    /// Unique comment identifier.
    pub id: Uuid,
    /// The video this comment belongs to.
    pub video_id: Uuid,
    /// The comment author.
    pub user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment with its author's handle and avatar joined in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: UploaderSummary,
}
