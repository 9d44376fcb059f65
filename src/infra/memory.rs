//! In-process storage backend implementing every repository trait.
//!
//! Rows live in concurrent maps. Each row carries an insertion sequence so
//! records sharing a timestamp keep a stable order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, LikesRepo, PostsRepo, ProfilesRepo,
    RepoError,
};
use crate::domain::entities::{CommentRecord, PostRecord, ProfileRecord};
use crate::domain::types::LikeTarget;

const USERNAME_CONSTRAINT: &str = "profiles_username_key";

#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    record: T,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    seq: AtomicU64,
    profiles: DashMap<Uuid, ProfileRecord>,
    usernames: DashMap<String, Uuid>,
    posts: DashMap<Uuid, Row<PostRecord>>,
    comments: DashMap<Uuid, Row<CommentRecord>>,
    likes: DashMap<LikeTarget, HashSet<Uuid>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert or replace a profile row.
    pub fn insert_profile(&self, profile: ProfileRecord) -> Uuid {
        let id = profile.id;
        if let Some(previous) = self.profiles.get(&id).map(|row| row.username.clone()) {
            self.usernames.remove_if(&previous, |_, owner| *owner == id);
        }
        self.usernames.insert(profile.username.clone(), id);
        self.profiles.insert(id, profile);
        id
    }

    /// Insert or replace a post row.
    pub fn insert_post(&self, post: PostRecord) -> Uuid {
        let id = post.id;
        let seq = self.next_seq();
        self.posts.insert(id, Row { seq, record: post });
        id
    }

    /// Insert or replace a comment row.
    pub fn insert_comment(&self, comment: CommentRecord) -> Uuid {
        let id = comment.id;
        let seq = self.next_seq();
        self.comments.insert(id, Row { seq, record: comment });
        id
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn remove_comments_where(&self, predicate: impl Fn(&CommentRecord) -> bool) -> Vec<Uuid> {
        let ids: Vec<Uuid> = self
            .comments
            .iter()
            .filter(|row| predicate(&row.record))
            .map(|row| *row.key())
            .collect();
        for id in &ids {
            self.comments.remove(id);
            self.likes.remove(&LikeTarget::Comment(*id));
        }
        ids
    }
}

#[async_trait]
impl PostsRepo for MemoryBackend {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let mut rows: Vec<Row<PostRecord>> =
            self.posts.iter().map(|row| row.value().clone()).collect();
        rows.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(rows.into_iter().map(|row| row.record).collect())
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.posts.get(&id).map(|row| row.record.clone()))
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let record = PostRecord {
            id: Uuid::new_v4(),
            author_id: params.author_id,
            title: params.title,
            content: params.content,
            cover_image: params.cover_image,
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert_post(record.clone());
        Ok(record)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        if self.posts.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        self.likes.remove(&LikeTarget::Post(id));
        self.remove_comments_where(|comment| comment.post_id == id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryBackend {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let mut rows: Vec<Row<CommentRecord>> = self
            .comments
            .iter()
            .filter(|row| row.record.post_id == post_id)
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(rows.into_iter().map(|row| row.record).collect())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.comments.get(&id).map(|row| row.record.clone()))
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post {} does not exist", params.post_id),
            });
        }
        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            user_id: params.user_id,
            parent_id: params.parent_id,
            content: params.content,
            created_at: OffsetDateTime::now_utc(),
        };
        self.insert_comment(record.clone());
        Ok(record)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        if self.comments.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        self.likes.remove(&LikeTarget::Comment(id));
        self.remove_comments_where(|comment| comment.parent_id == Some(id));
        Ok(())
    }
}

#[async_trait]
impl LikesRepo for MemoryBackend {
    async fn likers(&self, target: LikeTarget) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .likes
            .get(&target)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn insert_like(&self, target: LikeTarget, user_id: Uuid) -> Result<(), RepoError> {
        let exists = match target {
            LikeTarget::Post(id) => self.posts.contains_key(&id),
            LikeTarget::Comment(id) => self.comments.contains_key(&id),
        };
        if !exists {
            return Err(RepoError::NotFound);
        }
        self.likes.entry(target).or_default().insert(user_id);
        Ok(())
    }

    async fn delete_like(&self, target: LikeTarget, user_id: Uuid) -> Result<(), RepoError> {
        if let Some(mut users) = self.likes.get_mut(&target) {
            users.remove(&user_id);
        }
        self.likes.remove_if(&target, |_, users| users.is_empty());
        Ok(())
    }
}

#[async_trait]
impl ProfilesRepo for MemoryBackend {
    async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
        Ok(self.profiles.get(&id).map(|row| row.clone()))
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<ProfileRecord, RepoError> {
        let previous = self
            .profiles
            .get(&id)
            .map(|row| row.username.clone())
            .ok_or(RepoError::NotFound)?;

        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(entry) if *entry.get() != id => {
                return Err(RepoError::Duplicate {
                    constraint: USERNAME_CONSTRAINT.to_string(),
                });
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        if previous != username {
            self.usernames.remove_if(&previous, |_, owner| *owner == id);
        }

        let mut row = self.profiles.get_mut(&id).ok_or(RepoError::NotFound)?;
        row.username = username.to_string();
        Ok(row.clone())
    }

    async fn update_avatar(
        &self,
        id: Uuid,
        avatar_url: Option<String>,
    ) -> Result<ProfileRecord, RepoError> {
        let mut row = self.profiles.get_mut(&id).ok_or(RepoError::NotFound)?;
        row.avatar_url = avatar_url;
        Ok(row.clone())
    }
}
