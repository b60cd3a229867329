//! HTTP API: router assembly, shared state, and the service-level endpoints.

mod comments;
mod media;
mod users;
mod videos;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use vidora_store::Database;

use crate::auth::TokenKeys;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

#[derive(Clone)]
pub struct AppState {
    /// SQLite handle.  `rusqlite::Connection` is `Send` but not `Sync`, so
    /// handlers serialize access through this mutex.
    pub db: Arc<Mutex<Database>>,
    pub media: Arc<MediaStore>,
    pub token_keys: TokenKeys,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let max_upload = state.config.max_upload_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/register", post(users::register))
        .route("/auth/login", post(users::login))
        .route("/users/me", get(users::me))
        .route("/users/{id}", get(users::profile))
        .route("/users/{id}/subscribe", post(users::subscribe))
        .route("/users/{id}/unsubscribe", post(users::unsubscribe))
        .route("/videos", get(videos::home_feed))
        .route("/videos", post(videos::upload))
        .route("/videos/mine", get(videos::my_videos))
        .route("/videos/{id}", get(videos::open))
        .route("/videos/{id}", patch(videos::update))
        .route("/videos/{id}", delete(videos::remove))
        .route("/videos/{id}/thumbnail", post(videos::replace_thumbnail))
        .route("/videos/{id}/related", get(videos::related))
        .route("/videos/{id}/like", post(videos::like))
        .route("/videos/{id}/dislike", post(videos::dislike))
        .route("/videos/{id}/comments", get(comments::list))
        .route("/videos/{id}/comments", post(comments::create))
        .route("/comments/{id}", patch(comments::update))
        .route("/comments/{id}", delete(comments::remove))
        .route("/media/{file}", get(media::serve))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;
    use uuid::Uuid;
    use vidora_store::{User, Video};

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("vidora.db")).unwrap();
        let media = MediaStore::new(dir.path().join("media"), 1024 * 1024)
            .await
            .unwrap();
        let state = AppState {
            db: Arc::new(Mutex::new(db)),
            media: Arc::new(media),
            token_keys: TokenKeys::ephemeral(),
            config: Arc::new(ServerConfig::default()),
        };
        (state, dir)
    }

    fn user_fixture(handle: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            display_name: handle.to_string(),
            password_hash: "$argon2id$test".to_string(),
            avatar_url: String::new(),
            avatar_media_id: String::new(),
            cover_url: None,
            cover_media_id: None,
            subscribers: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn video_fixture(uploader: Uuid, title: &str) -> Video {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Video {
            id,
            uploader_id: uploader,
            title: title.to_string(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            media_url: format!("/media/{id}.mp4"),
            media_id: format!("{id}.mp4"),
            thumbnail_url: String::new(),
            thumbnail_id: String::new(),
            views: 0,
            likes: 0,
            dislikes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    async fn get(router: &Router, uri: &str) -> axum::response::Response {
        router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let (state, _dir) = test_state().await;
        let router = build_router(state);

        let response = get(&router, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_id_captures_reach_handlers() {
        let (state, _dir) = test_state().await;
        let alice = user_fixture("alice");
        let video = video_fixture(alice.id, "clip");
        {
            let db = state.db.lock().await;
            db.create_user(&alice).unwrap();
            db.create_video(&video).unwrap();
        }
        let router = build_router(state.clone());

        // The watch page resolves through the path capture and counts a view.
        let response = get(&router, &format!("/videos/{}", video.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.db.lock().await.get_video(video.id).unwrap().views,
            1
        );

        // An unknown id still matches the route and 404s in the handler.
        let response = get(&router, &format!("/videos/{}", Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_media_route_serves_stored_file() {
        let (state, _dir) = test_state().await;
        let stored = state.media.put(b"frame-data", "clip.mp4").await.unwrap();
        let router = build_router(state);

        let response = get(&router, &format!("/media/{}", stored.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );
    }

    #[tokio::test]
    async fn test_subscribe_route_authenticates() {
        let (state, _dir) = test_state().await;
        let alice = user_fixture("alice");
        let bob = user_fixture("bob");
        {
            let db = state.db.lock().await;
            db.create_user(&alice).unwrap();
            db.create_user(&bob).unwrap();
        }
        let token = state.token_keys.issue(alice.id).unwrap();
        let router = build_router(state.clone());

        // No credential: the route matches and the handler rejects.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/users/{}/subscribe", bob.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/users/{}/subscribe", bob.id))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["subscribed"], true);
        assert_eq!(body["changed"], true);
        assert_eq!(state.db.lock().await.get_user(bob.id).unwrap().subscribers, 1);
    }

    #[tokio::test]
    async fn test_profile_route_hides_email() {
        let (state, _dir) = test_state().await;
        let alice = user_fixture("alice");
        state.db.lock().await.create_user(&alice).unwrap();
        let router = build_router(state);

        let response = get(&router, &format!("/users/{}", alice.id)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["handle"], "alice");
        assert!(body.get("email").is_none());
        assert!(body.get("password_hash").is_none());
    }
}
