//! Comment endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use vidora_store::{Comment, CommentView};

use crate::api::AppState;
use crate::auth;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

/// `GET /videos/{id}/comments` -- newest first.
pub async fn list(
    State(state): State<AppState>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, ServerError> {
    let db = state.db.lock().await;
    // Distinguish "no comments" from "no such video".
    db.get_video(video_id)?;
    let comments = db.list_comments_for_video(video_id)?;
    Ok(Json(comments))
}

/// `POST /videos/{id}/comments`
pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(video_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;
    let body = non_empty_body(&req.body)?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        video_id,
        user_id,
        body,
        created_at: now,
        updated_at: now,
    };
    state.db.lock().await.create_comment(&comment)?;
    Ok(Json(comment))
}

/// `PATCH /comments/{id}` -- author-only body edit.
pub async fn update(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<Comment>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;
    let body = non_empty_body(&req.body)?;

    let db = state.db.lock().await;
    let comment = db.get_comment(id)?;
    if comment.user_id != user_id {
        return Err(ServerError::Forbidden("Not the author".into()));
    }
    let updated = db.update_comment(id, &body)?;
    Ok(Json(updated))
}

/// `DELETE /comments/{id}` -- the author or the video's uploader may delete.
pub async fn remove(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let user_id = auth::require_user(&headers, &state.token_keys)?;

    let db = state.db.lock().await;
    let comment = db.get_comment(id)?;
    if comment.user_id != user_id {
        let video = db.get_video(comment.video_id)?;
        if video.uploader_id != user_id {
            return Err(ServerError::Forbidden(
                "Only the author or the uploader may delete a comment".into(),
            ));
        }
    }
    db.delete_comment(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

fn non_empty_body(body: &str) -> Result<String, ServerError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ServerError::BadRequest("Empty comment body".into()));
    }
    Ok(body.to_string())
}
