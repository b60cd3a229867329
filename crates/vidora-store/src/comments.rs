//! CRUD operations for [`Comment`] records.

use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, CommentView, UploaderSummary};
use crate::users::{parse_timestamp, parse_uuid};

const COMMENT_COLUMNS: &str = "c.id, c.video_id, c.user_id, c.body, c.created_at, c.updated_at";

impl Database {
    /// Insert a new comment.  Both the video and the author must exist; the
    /// foreign keys reject dangling references.
    pub fn create_comment(&self, comment: &Comment) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO comments (id, video_id, user_id, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.id.to_string(),
                    comment.video_id.to_string(),
                    comment.user_id.to_string(),
                    comment.body,
                    comment.created_at.to_rfc3339(),
                    comment.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::NotFound
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    /// Fetch a single comment by id.
    pub fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.conn()
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?1"),
                params![id.to_string()],
                row_to_comment,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List a video's comments, newest first, with each author joined in.
    pub fn list_comments_for_video(&self, video_id: Uuid) -> Result<Vec<CommentView>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS}, u.handle, u.avatar_url
             FROM comments c
             JOIN users u ON u.id = c.user_id
             WHERE c.video_id = ?1
             ORDER BY c.created_at DESC, c.rowid DESC",
        ))?;
        let rows = stmt.query_map(params![video_id.to_string()], |row| {
            Ok(CommentView {
                comment: row_to_comment(row)?,
                author: UploaderSummary {
                    handle: row.get(6)?,
                    avatar_url: row.get(7)?,
                },
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    /// Replace a comment's body.  Returns the updated record.
    pub fn update_comment(&self, id: Uuid, body: &str) -> Result<Comment> {
        let affected = self.conn().execute(
            "UPDATE comments SET body = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                body,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_comment(id)
    }

    /// Delete a comment row.  Returns `true` if a row was deleted.
    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

/// Map a `rusqlite::Row` (selected with [`COMMENT_COLUMNS`]) to a [`Comment`].
fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let id_str: String = row.get(0)?;
    let video_str: String = row.get(1)?;
    let user_str: String = row.get(2)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    Ok(Comment {
        id: parse_uuid(0, &id_str)?,
        video_id: parse_uuid(1, &video_str)?,
        user_id: parse_uuid(2, &user_str)?,
        body: row.get(3)?,
        created_at: parse_timestamp(4, &created_str)?,
        updated_at: parse_timestamp(5, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{new_user, new_video, open_test_db};
    use chrono::{Duration, Utc};

    fn comment_fixture(video: Uuid, user: Uuid, body: &str, offset: i64) -> Comment {
        let at = Utc::now() + Duration::seconds(offset);
        Comment {
            id: Uuid::new_v4(),
            video_id: video,
            user_id: user,
            body: body.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn create_list_newest_first() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let bob = new_user(&db, "bob");
        let video = new_video(&db, alice.id, "v", 0);

        db.create_comment(&comment_fixture(video.id, alice.id, "first", 0))
            .unwrap();
        db.create_comment(&comment_fixture(video.id, bob.id, "second", 1))
            .unwrap();

        let comments = db.list_comments_for_video(video.id).unwrap();
        let bodies: Vec<&str> = comments.iter().map(|c| c.comment.body.as_str()).collect();
        assert_eq!(bodies, vec!["second", "first"]);
        assert_eq!(comments[0].author.handle, "bob");
    }

    #[test]
    fn update_and_delete() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let video = new_video(&db, alice.id, "v", 0);
        let comment = comment_fixture(video.id, alice.id, "typo", 0);
        db.create_comment(&comment).unwrap();

        let updated = db.update_comment(comment.id, "fixed").unwrap();
        assert_eq!(updated.body, "fixed");
        assert!(updated.updated_at >= comment.updated_at);

        assert!(db.delete_comment(comment.id).unwrap());
        assert!(matches!(db.get_comment(comment.id), Err(StoreError::NotFound)));
        assert!(!db.delete_comment(comment.id).unwrap());
    }

    #[test]
    fn comment_on_missing_video_rejected() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");

        assert!(matches!(
            db.create_comment(&comment_fixture(Uuid::new_v4(), alice.id, "hi", 0)),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn deleting_video_cascades_comments() {
        let (db, _dir) = open_test_db();
        let alice = new_user(&db, "alice");
        let video = new_video(&db, alice.id, "v", 0);
        db.create_comment(&comment_fixture(video.id, alice.id, "hi", 0))
            .unwrap();

        db.delete_video(video.id).unwrap();
        assert!(db.list_comments_for_video(video.id).unwrap().is_empty());
    }
}
