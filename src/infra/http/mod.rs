//! HTTP surface: JSON API and media serving.

pub mod api;
mod extract;
mod middleware;

pub use extract::{
    COLOR_SCHEME_HINT, CONSENT_COOKIE, LOCALE_COOKIE, THEME_COOKIE, USER_ID_HEADER,
};

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::application::comments::CommentService;
use crate::application::likes::LikeService;
use crate::application::posts::PostService;
use crate::application::profiles::ProfileService;
use crate::application::render::{RenderService, render_service};
use crate::application::repos::{CommentsRepo, LikesRepo, PostsRepo, ProfilesRepo};
use crate::domain::preferences::Locale;
use crate::infra::media::MediaStorage;

#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub likes: Arc<LikeService>,
    pub profiles: Arc<ProfileService>,
    pub media: Arc<MediaStorage>,
    pub renderer: Arc<dyn RenderService>,
    pub default_locale: Locale,
}

impl AppState {
    /// Wire every service against one backend implementing all repositories.
    pub fn new<B>(backend: Arc<B>, media: Arc<MediaStorage>, default_locale: Locale) -> Self
    where
        B: PostsRepo + CommentsRepo + LikesRepo + ProfilesRepo + 'static,
    {
        let renderer: Arc<dyn RenderService> = render_service();
        let likes = Arc::new(LikeService::new(backend.clone()));
        let comments = CommentService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            likes.clone(),
            renderer.clone(),
        );
        let posts = PostService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            comments.clone(),
            likes.clone(),
            media.clone(),
            renderer.clone(),
        );
        let profiles = ProfileService::new(backend, media.clone());

        Self {
            posts: Arc::new(posts),
            comments: Arc::new(comments),
            likes,
            profiles: Arc::new(profiles),
            media,
            renderer,
            default_locale,
        }
    }
}

pub fn build_router(state: AppState, upload_body_limit: usize) -> Router {
    let media_route = format!("{}/{{*path}}", state.media.public_path());

    let uploads = Router::new()
        .route("/api/posts/cover", post(api::upload_cover))
        .route("/api/profile/avatar", put(api::replace_avatar))
        .layer(DefaultBodyLimit::max(upload_body_limit));

    Router::new()
        .route("/health", get(api::health))
        .route("/api/preferences", get(api::preferences))
        .route("/api/render", post(api::render_preview))
        .route("/api/posts", get(api::list_posts).post(api::create_post))
        .route(
            "/api/posts/{id}",
            get(api::get_post).delete(api::delete_post),
        )
        .route("/api/posts/{id}/like", post(api::toggle_post_like))
        .route("/api/posts/{id}/comments", post(api::add_comment))
        .route("/api/comments/{id}", delete(api::delete_comment))
        .route("/api/comments/{id}/like", post(api::toggle_comment_like))
        .route(
            "/api/profile",
            get(api::get_profile).patch(api::update_profile),
        )
        .route(&media_route, get(api::serve_media))
        .merge(uploads)
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
