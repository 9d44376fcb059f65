use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::comments::{AuthorCache, CommentService, CommentThread};
use crate::application::error::ActionError;
use crate::application::likes::{LikeService, LikeSnapshot};
use crate::application::render::{
    RenderRequest, RenderService, RenderTarget, excerpt, render_recorded,
};
use crate::application::repos::{CommentsRepo, CreatePostParams, PostsRepo, ProfilesRepo};
use crate::application::viewer::{Viewer, is_admin, require_admin};
use crate::domain::entities::{PostRecord, ProfileRecord};
use crate::domain::preferences::{DateStyle, Locale};
use crate::domain::types::{LikeTarget, Role};
use crate::infra::media::{MediaKind, MediaStorage, StoredMedia};

/// Display name for post authors without a profile.
pub const POST_AUTHOR_FALLBACK: &str = "Team";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl AuthorView {
    pub fn from_profile(id: Uuid, profile: Option<&ProfileRecord>, fallback: &str) -> Self {
        match profile {
            Some(profile) => Self {
                id,
                username: profile.username.clone(),
                role: profile.role,
                avatar_url: profile.avatar_url.clone(),
            },
            None => Self {
                id,
                username: fallback.to_string(),
                role: Role::User,
                avatar_url: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub author: AuthorView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_label: String,
    pub likes: LikeSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub id: Uuid,
    pub title: String,
    pub html: String,
    pub cover_image: Option<String>,
    pub author: AuthorView,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_label: String,
    pub likes: LikeSnapshot,
    pub comments: Vec<CommentThread>,
    pub comment_count: usize,
    pub can_delete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    comments_repo: Arc<dyn CommentsRepo>,
    profiles: Arc<dyn ProfilesRepo>,
    comments: CommentService,
    likes: Arc<LikeService>,
    media: Arc<MediaStorage>,
    renderer: Arc<dyn RenderService>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments_repo: Arc<dyn CommentsRepo>,
        profiles: Arc<dyn ProfilesRepo>,
        comments: CommentService,
        likes: Arc<LikeService>,
        media: Arc<MediaStorage>,
        renderer: Arc<dyn RenderService>,
    ) -> Self {
        Self {
            posts,
            comments_repo,
            profiles,
            comments,
            likes,
            media,
            renderer,
        }
    }

    /// Every post, newest first.
    pub async fn list(
        &self,
        viewer: &Viewer,
        locale: Locale,
    ) -> Result<Vec<PostSummary>, ActionError> {
        let records = self.posts.list_posts().await?;
        let mut authors = AuthorCache::default();
        let mut summaries = Vec::with_capacity(records.len());

        for record in records {
            let profile = authors.get(self.profiles.as_ref(), record.author_id).await?;
            let author = AuthorView::from_profile(record.author_id, profile, POST_AUTHOR_FALLBACK);
            let likes = self.likes.snapshot(LikeTarget::Post(record.id), viewer).await?;
            summaries.push(PostSummary {
                id: record.id,
                excerpt: excerpt(&record.content),
                created_label: locale.format_date(record.created_at, DateStyle::Long),
                title: record.title,
                cover_image: record.cover_image,
                author,
                created_at: record.created_at,
                likes,
            });
        }

        Ok(summaries)
    }

    pub async fn detail(
        &self,
        viewer: &Viewer,
        id: Uuid,
        locale: Locale,
    ) -> Result<PostDetail, ActionError> {
        let record = self
            .posts
            .find_post(id)
            .await?
            .ok_or_else(|| ActionError::not_found("post"))?;

        let author_profile = self.profiles.find_profile(record.author_id).await?;
        let author = AuthorView::from_profile(
            record.author_id,
            author_profile.as_ref(),
            POST_AUTHOR_FALLBACK,
        );
        let rendered = render_recorded(
            self.renderer.as_ref(),
            &RenderRequest::new(RenderTarget::PostBody(record.id), record.content.clone()),
        );
        let likes = self.likes.snapshot(LikeTarget::Post(record.id), viewer).await?;
        let comments = self.comments.threads(record.id, viewer, locale).await?;
        let comment_count = comments
            .iter()
            .map(|thread| 1 + thread.replies.len())
            .sum();

        Ok(PostDetail {
            id: record.id,
            title: record.title,
            html: rendered.html,
            cover_image: record.cover_image,
            author,
            created_at: record.created_at,
            created_label: locale.format_date(record.created_at, DateStyle::Long),
            likes,
            comments,
            comment_count,
            can_delete: is_admin(self.profiles.as_ref(), viewer).await?,
        })
    }

    pub async fn create(&self, viewer: &Viewer, post: NewPost) -> Result<PostRecord, ActionError> {
        let admin = require_admin(self.profiles.as_ref(), viewer, "create post").await?;

        let title = post.title.trim();
        if title.is_empty() {
            return Err(ActionError::validation("post title must not be blank"));
        }
        let content = post.content.trim();
        if content.is_empty() {
            return Err(ActionError::validation("post content must not be blank"));
        }
        let cover_image = post
            .cover_image
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let record = self
            .posts
            .create_post(CreatePostParams {
                author_id: admin.id,
                title: title.to_string(),
                content: content.to_string(),
                cover_image,
            })
            .await?;

        info!(
            target = "autostocker::application::posts",
            post_id = %record.id,
            author_id = %record.author_id,
            "post created"
        );
        Ok(record)
    }

    /// Delete a post with its comments and likes.
    pub async fn delete(&self, viewer: &Viewer, id: Uuid) -> Result<(), ActionError> {
        require_admin(self.profiles.as_ref(), viewer, "delete post").await?;

        let record = self
            .posts
            .find_post(id)
            .await?
            .ok_or_else(|| ActionError::not_found("post"))?;
        let comment_ids: Vec<Uuid> = self
            .comments_repo
            .list_for_post(id)
            .await?
            .into_iter()
            .map(|comment| comment.id)
            .collect();

        self.posts.delete_post(id).await?;

        self.likes.forget(LikeTarget::Post(id));
        for comment_id in &comment_ids {
            self.likes.forget(LikeTarget::Comment(*comment_id));
        }

        if let Some(stored) = record
            .cover_image
            .as_deref()
            .and_then(|url| self.media.stored_path_from_url(url))
            .filter(|stored| MediaKind::Cover.contains(stored))
            && let Err(err) = self.media.delete(&stored).await
        {
            warn!(
                target = "autostocker::application::posts",
                post_id = %id,
                stored_path = %stored,
                error = %err,
                "failed to remove cover image"
            );
        }

        info!(
            target = "autostocker::application::posts",
            post_id = %id,
            comments_removed = comment_ids.len(),
            "post deleted"
        );
        Ok(())
    }

    pub async fn upload_cover(
        &self,
        viewer: &Viewer,
        file_name: &str,
        data: Bytes,
    ) -> Result<StoredMedia, ActionError> {
        let admin = require_admin(self.profiles.as_ref(), viewer, "upload cover").await?;
        let stored = self
            .media
            .store(MediaKind::Cover, admin.id, file_name, data)
            .await?;

        info!(
            target = "autostocker::application::posts",
            stored_path = %stored.stored_path,
            size_bytes = stored.size_bytes,
            "cover image stored"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::comments::NewComment;
    use crate::application::render::render_service;
    use crate::infra::memory::MemoryBackend;
    use tempfile::TempDir;
    use time::macros::datetime;

    struct Fixture {
        _media_dir: TempDir,
        backend: Arc<MemoryBackend>,
        media: Arc<MediaStorage>,
        likes: Arc<LikeService>,
        posts: PostService,
        comments: CommentService,
        admin: Uuid,
        reader: Uuid,
    }

    fn fixture() -> Fixture {
        let media_dir = tempfile::tempdir().expect("tempdir");
        let media = Arc::new(
            MediaStorage::new(media_dir.path().join("media"), "/media").expect("media"),
        );
        let backend = Arc::new(MemoryBackend::new());
        let admin = backend.insert_profile(ProfileRecord {
            id: Uuid::new_v4(),
            username: "redazione".into(),
            role: Role::Admin,
            avatar_url: None,
        });
        let reader = backend.insert_profile(ProfileRecord {
            id: Uuid::new_v4(),
            username: "luca".into(),
            role: Role::User,
            avatar_url: None,
        });
        let likes = Arc::new(LikeService::new(backend.clone()));
        let comments = CommentService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            likes.clone(),
            render_service(),
        );
        let posts = PostService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            comments.clone(),
            likes.clone(),
            media.clone(),
            render_service(),
        );
        Fixture {
            _media_dir: media_dir,
            backend,
            media,
            likes,
            posts,
            comments,
            admin,
            reader,
        }
    }

    fn new_post(title: &str, content: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            content: content.to_string(),
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn only_admins_create_posts() {
        let fx = fixture();
        let err = fx
            .posts
            .create(&Viewer::anonymous(), new_post("T", "body"))
            .await
            .expect_err("anonymous");
        assert!(matches!(err, ActionError::LoginRequired));

        let err = fx
            .posts
            .create(&Viewer::signed_in(fx.reader), new_post("T", "body"))
            .await
            .expect_err("reader");
        assert!(matches!(err, ActionError::Forbidden(_)));

        let err = fx
            .posts
            .create(&Viewer::signed_in(fx.admin), new_post("  ", "body"))
            .await
            .expect_err("blank title");
        assert!(matches!(err, ActionError::Validation(_)));

        let created = fx
            .posts
            .create(&Viewer::signed_in(fx.admin), new_post(" Titolo ", "### Ciao"))
            .await
            .expect("admin");
        assert_eq!(created.title, "Titolo");
        assert_eq!(created.author_id, fx.admin);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_excerpts() {
        let fx = fixture();
        fx.backend.insert_post(PostRecord {
            id: Uuid::new_v4(),
            author_id: fx.admin,
            title: "Vecchio".into(),
            content: "### Titolo\n**grassetto** testo".into(),
            cover_image: None,
            created_at: datetime!(2026-01-02 09:00 UTC),
        });
        fx.backend.insert_post(PostRecord {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Nuovo".into(),
            content: "x".repeat(250),
            cover_image: None,
            created_at: datetime!(2026-10-18 14:05 UTC),
        });

        let list = fx
            .posts
            .list(&Viewer::anonymous(), Locale::It)
            .await
            .expect("list");
        assert_eq!(list[0].title, "Nuovo");
        assert_eq!(list[0].author.username, POST_AUTHOR_FALLBACK);
        assert_eq!(list[0].created_label, "18 ottobre 2026");
        assert_eq!(list[0].excerpt.chars().count(), 203);
        assert_eq!(list[1].excerpt, "Titolo grassetto testo");
        assert_eq!(list[1].author.username, "redazione");
    }

    #[tokio::test]
    async fn detail_renders_content_and_counts_comments() {
        let fx = fixture();
        let post = fx
            .posts
            .create(
                &Viewer::signed_in(fx.admin),
                new_post("Titolo", "### Sezione\nriga"),
            )
            .await
            .expect("create");
        let reader = Viewer::signed_in(fx.reader);
        let root = fx
            .comments
            .add(
                &reader,
                NewComment {
                    post_id: post.id,
                    parent_id: None,
                    content: "bello".into(),
                },
                Locale::En,
            )
            .await
            .expect("comment");
        fx.comments
            .add(
                &reader,
                NewComment {
                    post_id: post.id,
                    parent_id: Some(root.id),
                    content: "anche".into(),
                },
                Locale::En,
            )
            .await
            .expect("reply");

        let detail = fx
            .posts
            .detail(&reader, post.id, Locale::En)
            .await
            .expect("detail");
        assert!(detail.html.starts_with("<h3"));
        assert!(detail.html.contains("<br />riga"));
        assert_eq!(detail.comment_count, 2);
        assert!(!detail.can_delete);

        let missing = fx
            .posts
            .detail(&reader, Uuid::new_v4(), Locale::En)
            .await
            .expect_err("missing");
        assert!(matches!(missing, ActionError::NotFound { entity: "post" }));
    }

    #[tokio::test]
    async fn delete_cascades_and_forgets_likes() {
        let fx = fixture();
        let post = fx
            .posts
            .create(&Viewer::signed_in(fx.admin), new_post("Titolo", "testo"))
            .await
            .expect("create");
        let reader = Viewer::signed_in(fx.reader);
        let comment = fx
            .comments
            .add(
                &reader,
                NewComment {
                    post_id: post.id,
                    parent_id: None,
                    content: "ciao".into(),
                },
                Locale::It,
            )
            .await
            .expect("comment");
        fx.likes
            .toggle(LikeTarget::Post(post.id), &reader)
            .await
            .expect("like post");
        fx.likes
            .toggle(LikeTarget::Comment(comment.id), &reader)
            .await
            .expect("like comment");

        let err = fx
            .posts
            .delete(&reader, post.id)
            .await
            .expect_err("reader cannot delete");
        assert!(matches!(err, ActionError::Forbidden(_)));

        fx.posts
            .delete(&Viewer::signed_in(fx.admin), post.id)
            .await
            .expect("delete");
        assert!(fx.backend.find_post(post.id).await.expect("find").is_none());
        assert!(fx.backend.find_comment(comment.id).await.expect("find").is_none());
        assert_eq!(fx.likes.cached(LikeTarget::Post(post.id), fx.reader), None);
        assert_eq!(
            fx.likes.cached(LikeTarget::Comment(comment.id), fx.reader),
            None
        );
    }

    #[tokio::test]
    async fn cover_upload_requires_admin_and_image() {
        let fx = fixture();
        let err = fx
            .posts
            .upload_cover(
                &Viewer::signed_in(fx.reader),
                "cover.png",
                Bytes::from_static(b"img"),
            )
            .await
            .expect_err("reader");
        assert!(matches!(err, ActionError::Forbidden(_)));

        let stored = fx
            .posts
            .upload_cover(
                &Viewer::signed_in(fx.admin),
                "cover.png",
                Bytes::from_static(b"img"),
            )
            .await
            .expect("upload");
        assert!(stored.public_url.starts_with("/media/covers/"));
    }

    #[tokio::test]
    async fn post_delete_only_removes_stored_covers() {
        let fx = fixture();
        let admin = Viewer::signed_in(fx.admin);
        let avatar = fx
            .media
            .store(
                MediaKind::Avatar,
                fx.reader,
                "me.png",
                Bytes::from_static(b"avatar"),
            )
            .await
            .expect("avatar");
        let cover = fx
            .posts
            .upload_cover(&admin, "cover.png", Bytes::from_static(b"cover"))
            .await
            .expect("cover");

        let borrowed = fx
            .posts
            .create(
                &admin,
                NewPost {
                    cover_image: Some(avatar.public_url.clone()),
                    ..new_post("Prestito", "testo")
                },
            )
            .await
            .expect("post");
        let owned = fx
            .posts
            .create(
                &admin,
                NewPost {
                    cover_image: Some(cover.public_url.clone()),
                    ..new_post("Copertina", "testo")
                },
            )
            .await
            .expect("post");

        fx.posts.delete(&admin, borrowed.id).await.expect("delete");
        fx.posts.delete(&admin, owned.id).await.expect("delete");

        assert!(fx.media.read(&avatar.stored_path).await.is_ok());
        assert!(fx.media.read(&cover.stored_path).await.is_err());
    }
}
