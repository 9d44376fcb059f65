use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tracing::error;
use uuid::Uuid;

use crate::application::comments::NewComment;
use crate::application::error::HttpError;
use crate::application::posts::NewPost;
use crate::application::render::{
    ContentMetrics, RenderRequest, excerpt, render_recorded,
};
use crate::application::viewer::Viewer;
use crate::domain::preferences::{CookieConsent, Locale, Preferences, Theme, ThemePreference};
use crate::domain::types::LikeTarget;
use crate::infra::media::{MediaStorageError, StoredMedia, content_type_for};

use super::AppState;
use super::extract::COLOR_SCHEME_HINT;

#[derive(Debug, Deserialize)]
pub struct PreferencesQuery {
    /// Current page path, used to build the language switch link.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub locale: Locale,
    pub alternate_locale: Locale,
    pub alternate_path: Option<String>,
    pub theme: ThemePreference,
    pub effective_theme: Theme,
    pub toggled_theme: ThemePreference,
    pub cookie_consent: Option<CookieConsent>,
    pub cookie_banner_visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenderBody {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub html: String,
    pub excerpt: String,
    pub metrics: ContentMetrics,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameBody {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub checksum: String,
}

impl From<StoredMedia> for MediaResponse {
    fn from(stored: StoredMedia) -> Self {
        Self {
            url: stored.public_url,
            content_type: stored.content_type,
            size_bytes: stored.size_bytes,
            checksum: stored.checksum,
        }
    }
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn preferences(
    preferences: Preferences,
    headers: HeaderMap,
    Query(query): Query<PreferencesQuery>,
) -> Json<PreferencesResponse> {
    let system = system_theme(&headers);
    let alternate_locale = preferences.locale.toggled();
    Json(PreferencesResponse {
        locale: preferences.locale,
        alternate_locale,
        alternate_path: query
            .path
            .as_deref()
            .map(|path| alternate_locale.localized_path(path)),
        theme: preferences.theme,
        effective_theme: preferences.theme.resolve(system),
        toggled_theme: preferences.theme.toggle(system),
        cookie_consent: preferences.cookie_consent,
        cookie_banner_visible: preferences.cookie_banner_visible(),
    })
}

/// Platform theme from the colour scheme client hint, light when absent.
fn system_theme(headers: &HeaderMap) -> Theme {
    match headers
        .get(COLOR_SCHEME_HINT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().trim_matches('"'))
    {
        Some(value) if value.eq_ignore_ascii_case("dark") => Theme::Dark,
        _ => Theme::Light,
    }
}

pub async fn render_preview(
    State(state): State<AppState>,
    Json(body): Json<RenderBody>,
) -> Json<RenderResponse> {
    let excerpt = body.content.as_deref().map(excerpt).unwrap_or_default();
    let output = render_recorded(state.renderer.as_ref(), &RenderRequest::preview(body.content));
    Json(RenderResponse {
        html: output.html,
        excerpt,
        metrics: output.metrics,
    })
}

pub async fn list_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    preferences: Preferences,
) -> Result<impl IntoResponse, HttpError> {
    let posts = state.posts.list(&viewer, preferences.locale).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(body): Json<NewPost>,
) -> Result<impl IntoResponse, HttpError> {
    let post = state.posts.create(&viewer, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn upload_cover(
    State(state): State<AppState>,
    viewer: Viewer,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (file_name, data) = read_file_field(multipart).await?;
    let stored = state.posts.upload_cover(&viewer, &file_name, data).await?;
    Ok((StatusCode::CREATED, Json(MediaResponse::from(stored))))
}

pub async fn get_post(
    State(state): State<AppState>,
    viewer: Viewer,
    preferences: Preferences,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let post = state.posts.detail(&viewer, id, preferences.locale).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.posts.delete(&viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_post_like(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = state.likes.toggle(LikeTarget::Post(id), &viewer).await?;
    Ok(Json(snapshot))
}

pub async fn add_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    preferences: Preferences,
    Path(post_id): Path<Uuid>,
    Json(body): Json<CommentBody>,
) -> Result<impl IntoResponse, HttpError> {
    let comment = state
        .comments
        .add(
            &viewer,
            NewComment {
                post_id,
                parent_id: body.parent_id,
                content: body.content,
            },
            preferences.locale,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.comments.delete(&viewer, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_comment_like(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = state.likes.toggle(LikeTarget::Comment(id), &viewer).await?;
    Ok(Json(snapshot))
}

pub async fn get_profile(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<impl IntoResponse, HttpError> {
    let profile = state.profiles.me(&viewer).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(body): Json<UsernameBody>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = state
        .profiles
        .update_username(&viewer, &body.username)
        .await?;
    Ok(Json(outcome))
}

pub async fn replace_avatar(
    State(state): State<AppState>,
    viewer: Viewer,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (file_name, data) = read_file_field(multipart).await?;
    let profile = state
        .profiles
        .replace_avatar(&viewer, &file_name, data)
        .await?;
    Ok(Json(profile))
}

pub async fn serve_media(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::api::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(MediaStorageError::InvalidPath) => media_not_found(SOURCE),
        Err(MediaStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            media_not_found(SOURCE)
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn media_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Media not found",
        "The requested media is not available",
    )
    .into_response()
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type_for(path)) {
        headers.insert(CONTENT_TYPE, value);
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

/// Read the `file` field of a multipart upload.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, Bytes), HttpError> {
    const SOURCE: &str = "infra::http::api::read_file_field";

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        HttpError::new(
            SOURCE,
            err.status(),
            "Invalid multipart payload",
            err.body_text(),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|err| {
            HttpError::new(SOURCE, err.status(), "Failed to read upload", err.body_text())
        })?;
        return Ok((file_name, data));
    }

    Err(HttpError::new(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Missing file",
        "multipart payload has no `file` field",
    ))
}
