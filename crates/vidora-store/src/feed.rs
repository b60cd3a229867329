//! Home-feed composition and watch-page assembly.
//!
//! The home feed draws from three disjoint candidate pools with fixed
//! precedence: videos from subscribed channels, then videos from other
//! creators, then (only as backfill) the viewer's own uploads.  Precedence is
//! pool membership, not a global timestamp merge: a week-old video from a
//! subscribed channel outranks a minute-old video from a stranger.  Each pool
//! is internally newest-first and the pools' membership predicates are
//! mutually exclusive (subscribed / not-subscribed-and-not-self / self), so
//! the composed feed never needs a deduplication pass.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{FeedVideo, ReactionKind, UploaderProfile, Viewer, WatchPage};
use crate::videos::{collect_feed, row_to_feed_video, row_to_video};

/// Number of entries a feed page is filled up to.
pub const DEFAULT_PAGE_SIZE: usize = 30;

const FEED_COLUMNS: &str = "v.id, v.uploader_id, v.title, v.description, v.category, \
     v.tags_json, v.media_url, v.media_id, v.thumbnail_url, v.thumbnail_id, \
     v.views, v.likes, v.dislikes, v.created_at, v.updated_at, \
     u.handle, u.avatar_url";

impl Database {
    /// Compose the home feed for `viewer`, at most `page_size` entries.
    ///
    /// Anonymous viewers get the newest `page_size` videos across all
    /// uploaders.  Verified viewers get their subscription pool first, then
    /// the discovery pool, truncated to `page_size`; only when both pools
    /// together fall short is the remainder backfilled with the viewer's own
    /// uploads.  The result may be shorter than `page_size` when the store
    /// simply does not hold enough videos.
    ///
    /// Read-only: composing a feed mutates nothing.
    ///
    /// A `Verified` id that does not resolve to a user is a contract
    /// violation by the caller (credentials are verified before this is
    /// invoked) and surfaces as [`StoreError::NotFound`] rather than being
    /// silently downgraded to an anonymous feed.
    pub fn compose_home_feed(&self, viewer: Viewer, page_size: usize) -> Result<Vec<FeedVideo>> {
        let viewer_id = match viewer {
            Viewer::Anonymous => return self.recent_videos(page_size),
            Viewer::Verified(id) => id,
        };
        self.get_user(viewer_id)?;

        let mut combined = self.subscription_pool(viewer_id)?;
        combined.extend(self.discovery_pool(viewer_id)?);

        if combined.len() >= page_size {
            combined.truncate(page_size);
            return Ok(combined);
        }

        let remaining = page_size - combined.len();
        combined.extend(self.list_videos_by_uploader(viewer_id, Some(remaining))?);
        Ok(combined)
    }

    /// Newest videos across all uploaders, newest first.
    fn recent_videos(&self, limit: usize) -> Result<Vec<FeedVideo>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {FEED_COLUMNS}
             FROM videos v
             JOIN users u ON u.id = v.uploader_id
             ORDER BY v.created_at DESC, v.rowid DESC
             LIMIT ?1",
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_feed_video)?;
        collect_feed(rows)
    }

    /// Pool A: videos whose uploader the viewer subscribes to, newest first.
    fn subscription_pool(&self, viewer: Uuid) -> Result<Vec<FeedVideo>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {FEED_COLUMNS}
             FROM videos v
             JOIN users u ON u.id = v.uploader_id
             JOIN subscriptions s
               ON s.channel_id = v.uploader_id AND s.subscriber_id = ?1
             ORDER BY v.created_at DESC, v.rowid DESC",
        ))?;
        let rows = stmt.query_map(params![viewer.to_string()], row_to_feed_video)?;
        collect_feed(rows)
    }

    /// Pool B: videos from uploaders the viewer neither subscribes to nor is,
    /// newest first.
    fn discovery_pool(&self, viewer: Uuid) -> Result<Vec<FeedVideo>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {FEED_COLUMNS}
             FROM videos v
             JOIN users u ON u.id = v.uploader_id
             WHERE v.uploader_id != ?1
               AND v.uploader_id NOT IN
                   (SELECT channel_id FROM subscriptions WHERE subscriber_id = ?1)
             ORDER BY v.created_at DESC, v.rowid DESC",
        ))?;
        let rows = stmt.query_map(params![viewer.to_string()], row_to_feed_video)?;
        collect_feed(rows)
    }

    /// Open a video for watching.
    ///
    /// Fetches the video joined with its uploader's public profile, records
    /// exactly one view (on every open, anonymous included, with no dedup or
    /// cooldown), and derives the three viewer-relative booleans.  The raw
    /// reaction and subscription memberships stay inside the store; only the
    /// booleans are exposed.
    ///
    /// A missing video yields [`StoreError::NotFound`] and no view is
    /// recorded.
    pub fn open_video(&self, video_id: Uuid, viewer: Viewer) -> Result<WatchPage> {
        let (video, uploader) = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {FEED_COLUMNS}, u.subscribers
                     FROM videos v
                     JOIN users u ON u.id = v.uploader_id
                     WHERE v.id = ?1",
                ),
                params![video_id.to_string()],
                |row| {
                    let video = row_to_video(row)?;
                    let uploader = UploaderProfile {
                        handle: row.get(15)?,
                        avatar_url: row.get(16)?,
                        subscribers: row.get(17)?,
                    };
                    Ok((video, uploader))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        self.increment_views(video_id)?;

        let (liked, disliked, subscribed) = match viewer {
            Viewer::Anonymous => (false, false, false),
            Viewer::Verified(viewer_id) => {
                let reaction = self.get_reaction(video_id, viewer_id)?;
                (
                    reaction == Some(ReactionKind::Like),
                    reaction == Some(ReactionKind::Dislike),
                    self.is_subscribed(viewer_id, video.uploader_id)?,
                )
            }
        };

        Ok(WatchPage {
            video,
            uploader,
            liked,
            disliked,
            subscribed,
        })
    }
}
