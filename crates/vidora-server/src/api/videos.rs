//! Video endpoints: the home feed, the watch page, uploads, metadata edits,
//! and reactions.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vidora_store::{
    feed::DEFAULT_PAGE_SIZE, FeedVideo, ReactionKind, Video, VideoPatch, WatchPage,
};

use crate::api::AppState;
use crate::auth;
use crate::error::ServerError;
use crate::media_store::StoredMedia;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
pub struct FeedQuery {
    pub page_size: Option<usize>,
}

/// `GET /videos` -- the composed home feed.
///
/// Anonymous and authenticated callers both land here; the credential in the
/// `Authorization` header decides which composition they get.
pub async fn home_feed(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedVideo>>, ServerError> {
    let viewer = auth::viewer_from_headers(&headers, &state.token_keys);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let feed = state.db.lock().await.compose_home_feed(viewer, page_size)?;
    Ok(Json(feed))
}

/// `GET /videos/{id}` -- open a video for watching.  Counts one view.
pub async fn open(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WatchPage>, ServerError> {
    let viewer = auth::viewer_from_headers(&headers, &state.token_keys);
    let page = state.db.lock().await.open_video(id, viewer)?;
    Ok(Json(page))
}

/// `GET /videos/{id}/related`
pub async fn related(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FeedVideo>>, ServerError> {
    let related = state.db.lock().await.list_related_videos(id)?;
    Ok(Json(related))
}

/// `GET /videos/mine` -- the authenticated user's uploads, newest first.
pub async fn my_videos(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedVideo>>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;
    let videos = state.db.lock().await.list_videos_by_uploader(user_id, None)?;
    Ok(Json(videos))
}

/// `POST /videos` -- multipart upload with `title`, `description`,
/// `category`, `tags` (comma-separated) text fields, a required `video` file
/// and an optional `thumbnail` file.
pub async fn upload(
    headers: HeaderMap,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Video>, ServerError> {
    let uploader_id = auth::require_user(&headers, &state.token_keys)?;

    let mut title = None;
    let mut description = String::new();
    let mut category = String::new();
    let mut tags = Vec::new();
    let mut media: Option<StoredMedia> = None;
    let mut thumbnail: Option<StoredMedia> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => description = read_text(field).await?,
            "category" => category = read_text(field).await?,
            "tags" => tags = parse_tags(&read_text(field).await?),
            "video" | "thumbnail" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                let stored = state.media.put(&data, &file_name).await?;
                if name == "video" {
                    media = Some(stored);
                } else {
                    thumbnail = Some(stored);
                }
            }
            _ => {}
        }
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing 'title' field".into()))?;
    let media = media
        .ok_or_else(|| ServerError::BadRequest("Missing 'video' file in multipart form".into()))?;
    let (thumbnail_url, thumbnail_id) = match thumbnail {
        Some(stored) => (stored.url, stored.id),
        None => (String::new(), String::new()),
    };

    let now = Utc::now();
    let video = Video {
        id: Uuid::new_v4(),
        uploader_id,
        title,
        description,
        category,
        tags,
        media_url: media.url,
        media_id: media.id,
        thumbnail_url,
        thumbnail_id,
        views: 0,
        likes: 0,
        dislikes: 0,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = state.db.lock().await.create_video(&video) {
        // Don't leave orphaned files behind when the row insert fails.
        state.media.delete(&video.media_id).await.ok();
        if !video.thumbnail_id.is_empty() {
            state.media.delete(&video.thumbnail_id).await.ok();
        }
        return Err(e.into());
    }

    info!(video = %video.id, uploader = %uploader_id, "Video uploaded");
    Ok(Json(video))
}

#[derive(Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// `PATCH /videos/{id}` -- owner-only metadata edit.
pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVideoRequest>,
) -> Result<Json<Video>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;

    let db = state.db.lock().await;
    let video = db.get_video(id)?;
    if video.uploader_id != user_id {
        return Err(ServerError::Forbidden("Not the uploader".into()));
    }

    let patch = VideoPatch {
        title: req.title,
        description: req.description,
        category: req.category,
        tags: req.tags,
        thumbnail: None,
    };
    let updated = db.update_video(id, &patch)?;
    Ok(Json(updated))
}

/// `POST /videos/{id}/thumbnail` -- owner-only thumbnail replacement,
/// multipart with a `thumbnail` file.
pub async fn replace_thumbnail(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Video>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;

    let mut stored = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("thumbnail") {
            let file_name = field.file_name().unwrap_or("thumbnail").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
            stored = Some(state.media.put(&data, &file_name).await?);
        }
    }
    let stored = stored.ok_or_else(|| {
        ServerError::BadRequest("Missing 'thumbnail' file in multipart form".into())
    })?;

    let db = state.db.lock().await;
    let video = db.get_video(id)?;
    if video.uploader_id != user_id {
        state.media.delete(&stored.id).await.ok();
        return Err(ServerError::Forbidden("Not the uploader".into()));
    }

    let previous = video.thumbnail_id.clone();
    let patch = VideoPatch {
        thumbnail: Some((stored.url, stored.id)),
        ..Default::default()
    };
    let updated = db.update_video(id, &patch)?;
    drop(db);

    if !previous.is_empty() {
        state.media.delete(&previous).await.ok();
    }
    Ok(Json(updated))
}

/// `DELETE /videos/{id}` -- owner-only.  Releases the stored media files.
pub async fn remove(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;

    let db = state.db.lock().await;
    let video = db.get_video(id)?;
    if video.uploader_id != user_id {
        return Err(ServerError::Forbidden("Not the uploader".into()));
    }
    db.delete_video(id)?;
    drop(db);

    state.media.delete(&video.media_id).await.ok();
    if !video.thumbnail_id.is_empty() {
        state.media.delete(&video.thumbnail_id).await.ok();
    }

    info!(video = %id, uploader = %user_id, "Video deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Serialize)]
pub struct ReactionResponse {
    pub likes: i64,
    pub dislikes: i64,
    pub liked: bool,
    pub disliked: bool,
}

/// `POST /videos/{id}/like`
pub async fn like(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionResponse>, ServerError> {
    react(headers, state, id, ReactionKind::Like).await
}

/// `POST /videos/{id}/dislike`
pub async fn dislike(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReactionResponse>, ServerError> {
    react(headers, state, id, ReactionKind::Dislike).await
}

async fn react(
    headers: HeaderMap,
    state: AppState,
    video_id: Uuid,
    kind: ReactionKind,
) -> Result<Json<ReactionResponse>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;

    let mut db = state.db.lock().await;
    db.set_reaction(video_id, user_id, kind)?;
    let video = db.get_video(video_id)?;

    Ok(Json(ReactionResponse {
        likes: video.likes,
        dislikes: video.dislikes,
        liked: kind == ReactionKind::Like,
        disliked: kind == ReactionKind::Dislike,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))
}

/// Split a comma-separated tag list, dropping empties and surrounding
/// whitespace.
fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("rust, sqlite ,"), vec!["rust", "sqlite"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }
}
