use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::error::ActionError;
use crate::application::likes::{LikeService, LikeSnapshot};
use crate::application::posts::AuthorView;
use crate::application::render::{RenderRequest, RenderService, RenderTarget, render_recorded};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, ProfilesRepo};
use crate::application::viewer::{Viewer, is_admin};
use crate::domain::entities::{CommentRecord, ProfileRecord};
use crate::domain::preferences::{DateStyle, Locale};
use crate::domain::types::LikeTarget;

/// Display name for comment authors without a profile.
pub const COMMENT_AUTHOR_FALLBACK: &str = "Utente";

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author: AuthorView,
    pub html: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_label: String,
    pub likes: LikeSnapshot,
    pub can_delete: bool,
}

/// A top-level comment with its replies, both oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    posts: Arc<dyn PostsRepo>,
    profiles: Arc<dyn ProfilesRepo>,
    likes: Arc<LikeService>,
    renderer: Arc<dyn RenderService>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        posts: Arc<dyn PostsRepo>,
        profiles: Arc<dyn ProfilesRepo>,
        likes: Arc<LikeService>,
        renderer: Arc<dyn RenderService>,
    ) -> Self {
        Self {
            comments,
            posts,
            profiles,
            likes,
            renderer,
        }
    }

    pub async fn threads(
        &self,
        post_id: Uuid,
        viewer: &Viewer,
        locale: Locale,
    ) -> Result<Vec<CommentThread>, ActionError> {
        let records = self.comments.list_for_post(post_id).await?;
        let viewer_is_admin = is_admin(self.profiles.as_ref(), viewer).await?;
        let mut authors = AuthorCache::default();

        let mut threads: Vec<CommentThread> = Vec::new();
        let mut positions: HashMap<Uuid, usize> = HashMap::new();
        let mut replies = Vec::new();

        for record in records {
            if record.is_reply() {
                replies.push(record);
                continue;
            }
            let view = self
                .view(&record, viewer, viewer_is_admin, locale, &mut authors)
                .await?;
            positions.insert(record.id, threads.len());
            threads.push(CommentThread {
                comment: view,
                replies: Vec::new(),
            });
        }

        for record in replies {
            let Some(&index) = record.parent_id.and_then(|parent| positions.get(&parent)) else {
                continue;
            };
            let view = self
                .view(&record, viewer, viewer_is_admin, locale, &mut authors)
                .await?;
            threads[index].replies.push(view);
        }

        Ok(threads)
    }

    pub async fn add(
        &self,
        viewer: &Viewer,
        comment: NewComment,
        locale: Locale,
    ) -> Result<CommentView, ActionError> {
        let user_id = viewer.require_user()?;
        let content = comment.content.trim();
        if content.is_empty() {
            return Err(ActionError::validation("comment content must not be blank"));
        }

        if self.posts.find_post(comment.post_id).await?.is_none() {
            return Err(ActionError::not_found("post"));
        }

        if let Some(parent_id) = comment.parent_id {
            let parent = self
                .comments
                .find_comment(parent_id)
                .await?
                .ok_or_else(|| ActionError::not_found("comment"))?;
            if parent.post_id != comment.post_id {
                return Err(ActionError::validation(
                    "parent comment belongs to another post",
                ));
            }
            if parent.is_reply() {
                return Err(ActionError::validation("replies cannot be nested"));
            }
        }

        let record = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: comment.post_id,
                user_id,
                parent_id: comment.parent_id,
                content: content.to_string(),
            })
            .await?;

        info!(
            target = "autostocker::application::comments",
            comment_id = %record.id,
            post_id = %record.post_id,
            reply = record.is_reply(),
            "comment added"
        );

        let mut authors = AuthorCache::default();
        let viewer_is_admin = is_admin(self.profiles.as_ref(), viewer).await?;
        self.view(&record, viewer, viewer_is_admin, locale, &mut authors)
            .await
    }

    /// Delete a comment with its replies. Allowed for the author and admins.
    pub async fn delete(&self, viewer: &Viewer, comment_id: Uuid) -> Result<(), ActionError> {
        let user_id = viewer.require_user()?;
        let comment = self
            .comments
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| ActionError::not_found("comment"))?;

        if comment.user_id != user_id && !is_admin(self.profiles.as_ref(), viewer).await? {
            return Err(ActionError::Forbidden("delete comment"));
        }

        let reply_ids: Vec<Uuid> = self
            .comments
            .list_for_post(comment.post_id)
            .await?
            .into_iter()
            .filter(|reply| reply.parent_id == Some(comment_id))
            .map(|reply| reply.id)
            .collect();

        self.comments.delete_comment(comment_id).await?;

        self.likes.forget(LikeTarget::Comment(comment_id));
        for reply_id in &reply_ids {
            self.likes.forget(LikeTarget::Comment(*reply_id));
        }

        info!(
            target = "autostocker::application::comments",
            comment_id = %comment_id,
            post_id = %comment.post_id,
            replies_removed = reply_ids.len(),
            "comment deleted"
        );
        Ok(())
    }

    async fn view(
        &self,
        record: &CommentRecord,
        viewer: &Viewer,
        viewer_is_admin: bool,
        locale: Locale,
        authors: &mut AuthorCache,
    ) -> Result<CommentView, ActionError> {
        let profile = authors.get(self.profiles.as_ref(), record.user_id).await?;
        let author = AuthorView::from_profile(record.user_id, profile, COMMENT_AUTHOR_FALLBACK);
        let rendered = render_recorded(
            self.renderer.as_ref(),
            &RenderRequest::new(RenderTarget::Comment(record.id), record.content.clone()),
        );
        let likes = self
            .likes
            .snapshot(LikeTarget::Comment(record.id), viewer)
            .await?;

        Ok(CommentView {
            id: record.id,
            post_id: record.post_id,
            parent_id: record.parent_id,
            author,
            html: rendered.html,
            created_at: record.created_at,
            created_label: locale.format_date(record.created_at, DateStyle::Short),
            likes,
            can_delete: viewer_is_admin || viewer.user_id() == Some(record.user_id),
        })
    }
}

/// Profiles looked up while building one response.
#[derive(Default)]
pub(crate) struct AuthorCache {
    entries: HashMap<Uuid, Option<ProfileRecord>>,
}

impl AuthorCache {
    pub(crate) async fn get(
        &mut self,
        profiles: &dyn ProfilesRepo,
        id: Uuid,
    ) -> Result<Option<&ProfileRecord>, ActionError> {
        if !self.entries.contains_key(&id) {
            let profile = profiles.find_profile(id).await?;
            self.entries.insert(id, profile);
        }
        Ok(self.entries.get(&id).and_then(Option::as_ref))
    }
}
