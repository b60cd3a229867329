use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Comments on videos
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    video_id   TEXT NOT NULL,               -- FK -> videos(id)
    user_id    TEXT NOT NULL,               -- FK -> users(id)
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,               -- ISO-8601
    updated_at TEXT NOT NULL,

    FOREIGN KEY (video_id) REFERENCES videos(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id)  ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
