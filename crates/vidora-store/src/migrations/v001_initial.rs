//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `subscriptions`, `videos`, and
//! `reactions`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    handle          TEXT NOT NULL UNIQUE,       -- stored lowercase
    email           TEXT NOT NULL UNIQUE,
    display_name    TEXT NOT NULL,
    password_hash   TEXT NOT NULL,              -- PHC string (argon2)
    avatar_url      TEXT NOT NULL,
    avatar_media_id TEXT NOT NULL,
    cover_url       TEXT,
    cover_media_id  TEXT,
    subscribers     INTEGER NOT NULL DEFAULT 0, -- always equals the edge count below
    created_at      TEXT NOT NULL,              -- ISO-8601 / RFC-3339
    updated_at      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Subscriptions (subscriber follows channel)
-- ----------------------------------------------------------------
-- One row per edge; both directions of the relation are answered by this
-- table, so the symmetry invariant cannot drift.  users.subscribers is
-- updated in the same transaction as every edge mutation.
CREATE TABLE IF NOT EXISTS subscriptions (
    subscriber_id TEXT NOT NULL,                -- FK -> users(id)
    channel_id    TEXT NOT NULL,                -- FK -> users(id)
    created_at    TEXT NOT NULL,

    PRIMARY KEY (subscriber_id, channel_id),
    FOREIGN KEY (subscriber_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (channel_id)    REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON subscriptions(channel_id);

-- ----------------------------------------------------------------
-- Videos
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS videos (
    id           TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    uploader_id  TEXT NOT NULL,                 -- FK -> users(id), immutable
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    category     TEXT NOT NULL DEFAULT '',
    tags_json    TEXT NOT NULL DEFAULT '[]',
    media_url    TEXT NOT NULL,                 -- locator served by the media store
    media_id     TEXT NOT NULL,                 -- storage id usable for deletion
    thumbnail_url TEXT NOT NULL,
    thumbnail_id  TEXT NOT NULL,
    views        INTEGER NOT NULL DEFAULT 0,
    likes        INTEGER NOT NULL DEFAULT 0,
    dislikes     INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,

    FOREIGN KEY (uploader_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_videos_uploader_created
    ON videos(uploader_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_videos_created ON videos(created_at DESC);

-- ----------------------------------------------------------------
-- Reactions
-- ----------------------------------------------------------------
-- At most one row per (video, user): a viewer is either a liker, a
-- disliker, or neither, never both.  videos.likes / videos.dislikes are
-- updated in the same transaction as every row mutation.
CREATE TABLE IF NOT EXISTS reactions (
    video_id   TEXT NOT NULL,                   -- FK -> videos(id)
    user_id    TEXT NOT NULL,                   -- FK -> users(id)
    kind       TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    created_at TEXT NOT NULL,

    PRIMARY KEY (video_id, user_id),
    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id)  ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
