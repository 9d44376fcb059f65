//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CommentRecord, PostRecord, ProfileRecord};
use crate::domain::types::LikeTarget;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("storage timeout")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Remove a post together with its comments and every related like.
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments of a post, oldest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Remove a comment, its replies and their likes.
    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait LikesRepo: Send + Sync {
    /// Users who currently like `target`.
    async fn likers(&self, target: LikeTarget) -> Result<Vec<Uuid>, RepoError>;

    async fn insert_like(&self, target: LikeTarget, user_id: Uuid) -> Result<(), RepoError>;

    async fn delete_like(&self, target: LikeTarget, user_id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ProfilesRepo: Send + Sync {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError>;

    async fn update_username(&self, id: Uuid, username: &str)
    -> Result<ProfileRecord, RepoError>;

    async fn update_avatar(
        &self,
        id: Uuid,
        avatar_url: Option<String>,
    ) -> Result<ProfileRecord, RepoError>;
}
