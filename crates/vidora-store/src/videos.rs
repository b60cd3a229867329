//! CRUD operations for [`Video`] records, the view counter, and reaction
//! state transitions.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{FeedVideo, ReactionKind, ReactionOutcome, UploaderSummary, Video, VideoPatch};
use crate::users::{parse_timestamp, parse_uuid};

const VIDEO_COLUMNS: &str = "v.id, v.uploader_id, v.title, v.description, v.category, \
     v.tags_json, v.media_url, v.media_id, v.thumbnail_url, v.thumbnail_id, \
     v.views, v.likes, v.dislikes, v.created_at, v.updated_at";

/// Default cap on related-video lookups, mirroring the browse page.
pub const RELATED_LIMIT: usize = 20;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new video.  Both media objects must already be persisted in
    /// the media store; the row only carries their locators.
    pub fn create_video(&self, video: &Video) -> Result<()> {
        let tags_json = serde_json::to_string(&video.tags)?;

        self.conn().execute(
            "INSERT INTO videos (id, uploader_id, title, description, category, tags_json,
                                 media_url, media_id, thumbnail_url, thumbnail_id,
                                 views, likes, dislikes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                video.id.to_string(),
                video.uploader_id.to_string(),
                video.title,
                video.description,
                video.category,
                tags_json,
                video.media_url,
                video.media_id,
                video.thumbnail_url,
                video.thumbnail_id,
                video.views,
                video.likes,
                video.dislikes,
                video.created_at.to_rfc3339(),
                video.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single video by id.
    pub fn get_video(&self, id: Uuid) -> Result<Video> {
        self.conn()
            .query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.id = ?1"),
                params![id.to_string()],
                row_to_video,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a user's uploads, newest first, with the uploader joined in.
    pub fn list_videos_by_uploader(&self, uploader: Uuid, limit: Option<usize>) -> Result<Vec<FeedVideo>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VIDEO_COLUMNS}, u.handle, u.avatar_url
             FROM videos v
             JOIN users u ON u.id = v.uploader_id
             WHERE v.uploader_id = ?1
             ORDER BY v.created_at DESC, v.rowid DESC
             LIMIT ?2",
        ))?;

        // A negative LIMIT means "no limit" in SQLite.
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![uploader.to_string(), limit], row_to_feed_video)?;
        collect_feed(rows)
    }

    /// Videos related to `id`: same category or at least one shared tag,
    /// excluding the video itself, newest first, capped at [`RELATED_LIMIT`].
    pub fn list_related_videos(&self, id: Uuid) -> Result<Vec<FeedVideo>> {
        let current = self.get_video(id)?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VIDEO_COLUMNS}, u.handle, u.avatar_url
             FROM videos v
             JOIN users u ON u.id = v.uploader_id
             WHERE v.id != ?1
             ORDER BY v.created_at DESC, v.rowid DESC",
        ))?;
        let rows = stmt.query_map(params![id.to_string()], row_to_feed_video)?;

        // Tag overlap is decided here rather than in SQL; tags are a JSON
        // column and the candidate set is already newest-first.
        let mut related = Vec::new();
        for row in rows {
            let candidate = row?;
            let same_category =
                !current.category.is_empty() && candidate.video.category == current.category;
            let shared_tag = candidate
                .video
                .tags
                .iter()
                .any(|tag| current.tags.contains(tag));
            if same_category || shared_tag {
                related.push(candidate);
                if related.len() == RELATED_LIMIT {
                    break;
                }
            }
        }
        Ok(related)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply an owner-initiated metadata edit and return the updated record.
    pub fn update_video(&self, id: Uuid, patch: &VideoPatch) -> Result<Video> {
        let mut video = self.get_video(id)?;

        if let Some(title) = &patch.title {
            video.title = title.clone();
        }
        if let Some(description) = &patch.description {
            video.description = description.clone();
        }
        if let Some(category) = &patch.category {
            video.category = category.clone();
        }
        if let Some(tags) = &patch.tags {
            video.tags = tags.clone();
        }
        if let Some((url, media_id)) = &patch.thumbnail {
            video.thumbnail_url = url.clone();
            video.thumbnail_id = media_id.clone();
        }
        video.updated_at = Utc::now();

        let tags_json = serde_json::to_string(&video.tags)?;
        self.conn().execute(
            "UPDATE videos
             SET title = ?2, description = ?3, category = ?4, tags_json = ?5,
                 thumbnail_url = ?6, thumbnail_id = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                id.to_string(),
                video.title,
                video.description,
                video.category,
                tags_json,
                video.thumbnail_url,
                video.thumbnail_id,
                video.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(video)
    }

    /// Record one view.  Atomic at the store level, so concurrent opens of
    /// the same video never lose increments.
    pub fn increment_views(&self, id: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE videos SET views = views + 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a video row.  Returns `true` if a row was deleted.  The caller
    /// is responsible for releasing the two media-store objects first.
    pub fn delete_video(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM videos WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------

    /// The viewer's current reaction to a video, if any.
    pub fn get_reaction(&self, video_id: Uuid, user_id: Uuid) -> Result<Option<ReactionKind>> {
        let kind: Option<String> = self
            .conn()
            .query_row(
                "SELECT kind FROM reactions WHERE video_id = ?1 AND user_id = ?2",
                params![video_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match kind.as_deref() {
            Some("like") => Some(ReactionKind::Like),
            Some("dislike") => Some(ReactionKind::Dislike),
            _ => None,
        })
    }

    /// Set the viewer's reaction to `kind` in one transactional state
    /// transition.
    ///
    /// The single `(video_id, user_id)` reaction row means a viewer can never
    /// be a liker and a disliker at once; the denormalized `likes` /
    /// `dislikes` counters move in the same transaction as the row.
    pub fn set_reaction(
        &mut self,
        video_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome> {
        let tx = self.conn_mut().transaction()?;

        let found: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM videos WHERE id = ?1",
                params![video_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::NotFound);
        }

        let current: Option<String> = tx
            .query_row(
                "SELECT kind FROM reactions WHERE video_id = ?1 AND user_id = ?2",
                params![video_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match current.as_deref() {
            Some(existing) if existing == kind.as_str() => ReactionOutcome::Unchanged,
            Some(_) => {
                tx.execute(
                    "UPDATE reactions SET kind = ?3 WHERE video_id = ?1 AND user_id = ?2",
                    params![video_id.to_string(), user_id.to_string(), kind.as_str()],
                )?;
                let (inc, dec) = counter_columns(kind);
                tx.execute(
                    &format!(
                        "UPDATE videos SET {inc} = {inc} + 1, {dec} = {dec} - 1 WHERE id = ?1"
                    ),
                    params![video_id.to_string()],
                )?;
                ReactionOutcome::Switched
            }
            None => {
                tx.execute(
                    "INSERT INTO reactions (video_id, user_id, kind, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        video_id.to_string(),
                        user_id.to_string(),
                        kind.as_str(),
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                let (inc, _) = counter_columns(kind);
                tx.execute(
                    &format!("UPDATE videos SET {inc} = {inc} + 1 WHERE id = ?1"),
                    params![video_id.to_string()],
                )?;
                ReactionOutcome::Applied
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn counter_columns(kind: ReactionKind) -> (&'static str, &'static str) {
    match kind {
        ReactionKind::Like => ("likes", "dislikes"),
        ReactionKind::Dislike => ("dislikes", "likes"),
    }
}

/// Map a `rusqlite::Row` (selected with [`VIDEO_COLUMNS`]) to a [`Video`].
pub(crate) fn row_to_video(row: &rusqlite::Row<'_>) -> rusqlite::Result<Video> {
    let id_str: String = row.get(0)?;
    let uploader_str: String = row.get(1)?;
    let tags_json: String = row.get(5)?;
    let created_str: String = row.get(13)?;
    let updated_str: String = row.get(14)?;

    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Video {
        id: parse_uuid(0, &id_str)?,
        uploader_id: parse_uuid(1, &uploader_str)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        tags,
        media_url: row.get(6)?,
        media_id: row.get(7)?,
        thumbnail_url: row.get(8)?,
        thumbnail_id: row.get(9)?,
        views: row.get(10)?,
        likes: row.get(11)?,
        dislikes: row.get(12)?,
        created_at: parse_timestamp(13, &created_str)?,
        updated_at: parse_timestamp(14, &updated_str)?,
    })
}

/// Map a row of [`VIDEO_COLUMNS`] plus `u.handle, u.avatar_url` to a
/// [`FeedVideo`].
pub(crate) fn row_to_feed_video(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedVideo> {
    Ok(FeedVideo {
        video: row_to_video(row)?,
        uploader: UploaderSummary {
            handle: row.get(15)?,
            avatar_url: row.get(16)?,
        },
    })
}

pub(crate) fn collect_feed(
    rows: impl Iterator<Item = rusqlite::Result<FeedVideo>>,
) -> Result<Vec<FeedVideo>> {
    let mut videos = Vec::new();
    for row in rows {
        videos.push(row?);
    }
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{new_user, new_video, open_test_db};

    #[test]
    fn create_update_delete_round_trip() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let video = new_video(&db, alice.id, "first", 0);

        let patch = VideoPatch {
            title: Some("renamed".into()),
            tags: Some(vec!["rust".into()]),
            ..Default::default()
        };
        let updated = db.update_video(video.id, &patch).unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.tags, vec!["rust".to_string()]);
        assert_eq!(db.get_video(video.id).unwrap().title, "renamed");

        assert!(db.delete_video(video.id).unwrap());
        assert!(matches!(db.get_video(video.id), Err(StoreError::NotFound)));
        assert!(!db.delete_video(video.id).unwrap());
    }

    #[test]
    fn view_counter_increments_by_one() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let video = new_video(&db, alice.id, "v", 0);

        db.increment_views(video.id).unwrap();
        db.increment_views(video.id).unwrap();
        assert_eq!(db.get_video(video.id).unwrap().views, 2);

        assert!(matches!(
            db.increment_views(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn reaction_mutual_exclusion() {
        let (mut db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let bob = new_user(&db, "bob");
        let video = new_video(&db, alice.id, "v", 0);

        assert_eq!(
            db.set_reaction(video.id, bob.id, ReactionKind::Like).unwrap(),
            ReactionOutcome::Applied
        );
        assert_eq!(
            db.set_reaction(video.id, bob.id, ReactionKind::Dislike).unwrap(),
            ReactionOutcome::Switched
        );

        // After a like -> dislike flip, the viewer is only a disliker and
        // both counters reflect exactly one transition.
        let fetched = db.get_video(video.id).unwrap();
        assert_eq!(fetched.likes, 0);
        assert_eq!(fetched.dislikes, 1);
        assert_eq!(
            db.get_reaction(video.id, bob.id).unwrap(),
            Some(ReactionKind::Dislike)
        );
    }

    #[test]
    fn liking_twice_is_idempotent() {
        let (mut db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let bob = new_user(&db, "bob");
        let video = new_video(&db, alice.id, "v", 0);

        assert_eq!(
            db.set_reaction(video.id, bob.id, ReactionKind::Like).unwrap(),
            ReactionOutcome::Applied
        );
        assert_eq!(
            db.set_reaction(video.id, bob.id, ReactionKind::Like).unwrap(),
            ReactionOutcome::Unchanged
        );

        let fetched = db.get_video(video.id).unwrap();
        assert_eq!(fetched.likes, 1);
        assert_eq!(fetched.dislikes, 0);
    }

    #[test]
    fn react_to_missing_video_fails() {
        let (mut db, _dir) = open_test_db();
        let bob = new_user(&db, "bob");
        assert!(matches!(
            db.set_reaction(Uuid::new_v4(), bob.id, ReactionKind::Like),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn related_videos_match_category_or_tag() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");

        let mut current = crate::testutil::video_fixture(alice.id, "current", 0);
        current.category = "music".into();
        current.tags = vec!["guitar".into()];
        db.create_video(&current).unwrap();

        let mut same_cat = crate::testutil::video_fixture(alice.id, "same-cat", 1);
        same_cat.category = "music".into();
        db.create_video(&same_cat).unwrap();

        let mut same_tag = crate::testutil::video_fixture(alice.id, "same-tag", 2);
        same_tag.category = "gaming".into();
        same_tag.tags = vec!["guitar".into(), "cover".into()];
        db.create_video(&same_tag).unwrap();

        let mut unrelated = crate::testutil::video_fixture(alice.id, "unrelated", 3);
        unrelated.category = "gaming".into();
        db.create_video(&unrelated).unwrap();

        let related = db.list_related_videos(current.id).unwrap();
        let titles: Vec<&str> = related.iter().map(|v| v.video.title.as_str()).collect();
        assert_eq!(titles, vec!["same-tag", "same-cat"]);
    }
}
