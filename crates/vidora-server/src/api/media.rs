//! Serving stored media files.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::error::ServerError;

/// `GET /media/{file}` -- serve a stored media file with its guessed
/// content type.
pub async fn serve(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ServerError> {
    let data = state.media.get(&file).await?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            // Stored names are random UUIDs; a name's content never changes.
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        data,
    )
        .into_response())
}
