//! Account endpoints: registration, login, profiles, subscriptions.

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vidora_store::User;

use crate::api::AppState;
use crate::auth;
use crate::error::ServerError;

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/register` -- multipart form with `handle`, `email`,
/// `display_name`, `password` text fields and an optional `avatar` file.
pub async fn register(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AuthResponse>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden(
            "Registration is closed on this instance".into(),
        ));
    }

    let mut handle = None;
    let mut email = None;
    let mut display_name = None;
    let mut password = None;
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "handle" => handle = Some(read_text(field).await?),
            "email" => email = Some(read_text(field).await?),
            "display_name" => display_name = Some(read_text(field).await?),
            "password" => password = Some(read_text(field).await?),
            "avatar" => {
                let file_name = field.file_name().unwrap_or("avatar").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                avatar = Some(state.media.put(&data, &file_name).await?);
            }
            _ => {}
        }
    }

    let handle = require_field(handle, "handle")?.to_lowercase();
    let email = require_field(email, "email")?;
    let password = require_field(password, "password")?;

    if handle.is_empty() || !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ServerError::BadRequest(
            "Handle must be non-empty alphanumeric (dashes allowed)".into(),
        ));
    }
    if !email.contains('@') {
        return Err(ServerError::BadRequest("Invalid email address".into()));
    }
    if password.len() < 8 {
        return Err(ServerError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let now = Utc::now();
    let (avatar_url, avatar_media_id) = match avatar {
        Some(stored) => (stored.url, stored.id),
        None => (String::new(), String::new()),
    };

    let user = User {
        id: Uuid::new_v4(),
        display_name: display_name.unwrap_or_else(|| handle.clone()),
        handle,
        email,
        password_hash: auth::hash_password(&password)?,
        avatar_url,
        avatar_media_id,
        cover_url: None,
        cover_media_id: None,
        subscribers: 0,
        created_at: now,
        updated_at: now,
    };

    state.db.lock().await.create_user(&user)?;
    let token = state.token_keys.issue(user.id)?;

    info!(user = %user.id, handle = %user.handle, "Registered new account");
    Ok(Json(AuthResponse { token, user }))
}

/// `POST /auth/login` -- JSON email + password.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let user = state
        .db
        .lock()
        .await
        .find_user_by_email(&req.email)?
        .ok_or(ServerError::InvalidCredentials)?;

    if !auth::verify_password(&user.password_hash, &req.password) {
        return Err(ServerError::InvalidCredentials);
    }

    let token = state.token_keys.issue(user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

/// `GET /users/me` -- the authenticated account.
pub async fn me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<User>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;
    let user = state.db.lock().await.get_user(user_id)?;
    Ok(Json(user))
}

/// The public slice of an account, as served to anyone looking at a
/// channel.  Email and storage ids stay private.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
    pub cover_url: Option<String>,
    pub subscribers: i64,
    pub created_at: DateTime<Utc>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            handle: user.handle,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            cover_url: user.cover_url,
            subscribers: user.subscribers,
            created_at: user.created_at,
        }
    }
}

/// `GET /users/{id}` -- a channel profile.
pub async fn profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, ServerError> {
    let user = state.db.lock().await.get_user(id)?;
    Ok(Json(ProfileResponse::from(user)))
}

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub subscribed: bool,
    /// `false` when the request was a benign no-op.
    pub changed: bool,
}

/// `POST /users/{id}/subscribe`
pub async fn subscribe(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(channel): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, ServerError> {
    let subscriber = auth::require_user(&headers, &state.token_keys)?;
    if subscriber == channel {
        return Err(ServerError::BadRequest(
            "Cannot subscribe to yourself".into(),
        ));
    }

    let changed = state.db.lock().await.subscribe(subscriber, channel)?;
    Ok(Json(SubscriptionResponse {
        subscribed: true,
        changed,
    }))
}

/// `POST /users/{id}/unsubscribe`
pub async fn unsubscribe(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(channel): Path<Uuid>,
) -> Result<Json<SubscriptionResponse>, ServerError> {
    let subscriber = auth::require_user(&headers, &state.token_keys)?;

    let changed = state.db.lock().await.unsubscribe(subscriber, channel)?;
    Ok(Json(SubscriptionResponse {
        subscribed: false,
        changed,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))
}

fn require_field(value: Option<String>, name: &str) -> Result<String, ServerError> {
    value.ok_or_else(|| ServerError::BadRequest(format!("Missing '{name}' field")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_omits_private_fields() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            handle: "alice".into(),
            email: "alice@example.com".into(),
            display_name: "Alice".into(),
            password_hash: "$argon2id$secret".into(),
            avatar_url: "/media/a.png".into(),
            avatar_media_id: "a.png".into(),
            cover_url: None,
            cover_media_id: None,
            subscribers: 3,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(ProfileResponse::from(user)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.get("email").is_none());
        assert!(obj.get("password_hash").is_none());
        assert!(obj.get("avatar_media_id").is_none());
        assert_eq!(json["handle"], "alice");
        assert_eq!(json["subscribers"], 3);
    }
}
