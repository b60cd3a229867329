//! CRUD operations for [`User`] records and the subscription graph.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

const USER_COLUMNS: &str = "id, handle, email, display_name, password_hash, \
     avatar_url, avatar_media_id, cover_url, cover_media_id, subscribers, \
     created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  A duplicate handle or email yields
    /// [`StoreError::AlreadyExists`].
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, handle, email, display_name, password_hash,
                                    avatar_url, avatar_media_id, cover_url, cover_media_id,
                                    subscribers, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    user.id.to_string(),
                    user.handle,
                    user.email,
                    user.display_name,
                    user.password_hash,
                    user.avatar_url,
                    user.avatar_media_id,
                    user.cover_url,
                    user.cover_media_id,
                    user.subscribers,
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| constraint_to_exists(e, "user with this handle or email"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Look up a user by email, e.g. for login.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Look up a user by handle (handles are stored lowercase).
    pub fn find_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE handle = ?1"),
                params![handle],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// Whether `subscriber` currently follows `channel`.
    pub fn is_subscribed(&self, subscriber: Uuid, channel: Uuid) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber.to_string(), channel.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ------------------------------------------------------------------
    // Subscription edges
    // ------------------------------------------------------------------

    /// Record that `subscriber` follows `channel`.
    ///
    /// The edge insert and the `users.subscribers` increment happen in one
    /// transaction so the denormalized count cannot drift.  Returns `false`
    /// (benign no-op) if the edge already exists; `NotFound` if either user
    /// id does not resolve.
    pub fn subscribe(&mut self, subscriber: Uuid, channel: Uuid) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        ensure_user_exists(&tx, subscriber)?;
        ensure_user_exists(&tx, channel)?;

        let already: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                params![subscriber.to_string(), channel.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if already.is_some() {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO subscriptions (subscriber_id, channel_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![
                subscriber.to_string(),
                channel.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.execute(
            "UPDATE users SET subscribers = subscribers + 1 WHERE id = ?1",
            params![channel.to_string()],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Remove the `subscriber` → `channel` edge.
    ///
    /// Returns `false` (benign no-op) if no such edge exists.
    pub fn unsubscribe(&mut self, subscriber: Uuid, channel: Uuid) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        ensure_user_exists(&tx, channel)?;

        let removed = tx.execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
            params![subscriber.to_string(), channel.to_string()],
        )?;
        if removed == 0 {
            return Ok(false);
        }

        tx.execute(
            "UPDATE users SET subscribers = subscribers - 1 WHERE id = ?1",
            params![channel.to_string()],
        )?;

        tx.commit()?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_user_exists(tx: &rusqlite::Transaction<'_>, id: Uuid) -> Result<()> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM users WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if found.is_none() {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

fn constraint_to_exists(e: rusqlite::Error, what: &str) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::AlreadyExists(what.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(10)?;
    let updated_str: String = row.get(11)?;

    Ok(User {
        id: parse_uuid(0, &id_str)?,
        handle: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        password_hash: row.get(4)?,
        avatar_url: row.get(5)?,
        avatar_media_id: row.get(6)?,
        cover_url: row.get(7)?,
        cover_media_id: row.get(8)?,
        subscribers: row.get(9)?,
        created_at: parse_timestamp(10, &created_str)?,
        updated_at: parse_timestamp(11, &updated_str)?,
    })
}

pub(crate) fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
