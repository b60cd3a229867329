//! Shared fixtures for store tests.

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::database::Database;
use crate::models::{User, Video};

/// Open a fresh database in a temp directory.  The `TempDir` must be kept
/// alive for the duration of the test.
pub(crate) fn open_test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("store.db")).unwrap();
    (db, dir)
}

pub(crate) fn user_fixture(handle: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        handle: handle.to_string(),
        email: format!("{handle}@example.com"),
        display_name: handle.to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$dGVzdHNhbHQ$dGVzdGhhc2g".to_string(),
        avatar_url: format!("/media/{handle}-avatar.png"),
        avatar_media_id: format!("{handle}-avatar.png"),
        cover_url: None,
        cover_media_id: None,
        subscribers: 0,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn new_user(db: &Database, handle: &str) -> User {
    let user = user_fixture(handle);
    db.create_user(&user).unwrap();
    user
}

/// A video timestamped `offset` seconds after a fixed base instant, so tests
/// control ordering explicitly.
pub(crate) fn video_fixture(uploader: Uuid, title: &str, offset: i64) -> Video {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset);
    let id = Uuid::new_v4();
    Video {
        id,
        uploader_id: uploader,
        title: title.to_string(),
        description: format!("description of {title}"),
        category: String::new(),
        tags: Vec::new(),
        media_url: format!("/media/{id}.mp4"),
        media_id: format!("{id}.mp4"),
        thumbnail_url: format!("/media/{id}.jpg"),
        thumbnail_id: format!("{id}.jpg"),
        views: 0,
        likes: 0,
        dislikes: 0,
        created_at: created,
        updated_at: created,
    }
}

pub(crate) fn new_video(db: &Database, uploader: Uuid, title: &str, offset: i64) -> Video {
    let video = video_fixture(uploader, title, offset);
    db.create_video(&video).unwrap();
    video
}
