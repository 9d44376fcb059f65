//! Seeding the in-process backend from a TOML archive.

use std::collections::{HashMap, HashSet};
use std::{fs, path::Path};

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::LikesRepo;
use crate::domain::entities::{CommentRecord, PostRecord, ProfileRecord};
use crate::domain::types::LikeTarget;
use crate::infra::{error::InfraError, memory::MemoryBackend};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedArchive {
    pub profiles: Vec<ProfileRecord>,
    pub posts: Vec<PostRecord>,
    pub comments: Vec<CommentRecord>,
    pub likes: Vec<SeedLike>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedLikeKind {
    Post,
    Comment,
}

#[derive(Debug, Deserialize)]
pub struct SeedLike {
    pub target: SeedLikeKind,
    pub id: Uuid,
    pub user_id: Uuid,
}

impl SeedLike {
    pub fn target(&self) -> LikeTarget {
        match self.target {
            SeedLikeKind::Post => LikeTarget::Post(self.id),
            SeedLikeKind::Comment => LikeTarget::Comment(self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub profiles: usize,
    pub posts: usize,
    pub comments: usize,
    pub likes: usize,
}

impl SeedArchive {
    pub fn parse(data: &str) -> Result<Self, InfraError> {
        let archive: SeedArchive = toml::from_str(data)
            .map_err(|err| InfraError::seed(format!("invalid archive: {err}")))?;
        archive.validate()?;
        Ok(archive)
    }

    /// Check references and uniqueness before anything is written.
    fn validate(&self) -> Result<(), InfraError> {
        let mut usernames = HashSet::new();
        for profile in &self.profiles {
            if profile.username.trim().is_empty() {
                return Err(InfraError::seed(format!(
                    "profile {} has a blank username",
                    profile.id
                )));
            }
            if !usernames.insert(profile.username.as_str()) {
                return Err(InfraError::seed(format!(
                    "duplicate username `{}`",
                    profile.username
                )));
            }
        }

        let post_ids: HashSet<Uuid> = self.posts.iter().map(|post| post.id).collect();
        let comments: HashMap<Uuid, &CommentRecord> = self
            .comments
            .iter()
            .map(|comment| (comment.id, comment))
            .collect();

        for comment in &self.comments {
            if !post_ids.contains(&comment.post_id) {
                return Err(InfraError::seed(format!(
                    "comment {} references unknown post {}",
                    comment.id, comment.post_id
                )));
            }
            if let Some(parent_id) = comment.parent_id {
                let parent = comments.get(&parent_id).ok_or_else(|| {
                    InfraError::seed(format!(
                        "comment {} references unknown parent {parent_id}",
                        comment.id
                    ))
                })?;
                if parent.post_id != comment.post_id || parent.is_reply() {
                    return Err(InfraError::seed(format!(
                        "comment {} must reply to a top-level comment of the same post",
                        comment.id
                    )));
                }
            }
        }

        for like in &self.likes {
            let known = match like.target() {
                LikeTarget::Post(id) => post_ids.contains(&id),
                LikeTarget::Comment(id) => comments.contains_key(&id),
            };
            if !known {
                return Err(InfraError::seed(format!(
                    "like references unknown {}",
                    like.target()
                )));
            }
        }

        Ok(())
    }

    pub async fn apply(self, backend: &MemoryBackend) -> Result<SeedSummary, InfraError> {
        let mut summary = SeedSummary {
            profiles: self.profiles.len(),
            posts: self.posts.len(),
            comments: self.comments.len(),
            likes: 0,
        };

        for profile in self.profiles {
            backend.insert_profile(profile);
        }
        for post in self.posts {
            backend.insert_post(post);
        }
        for comment in self.comments {
            backend.insert_comment(comment);
        }
        for like in self.likes {
            backend
                .insert_like(like.target(), like.user_id)
                .await
                .map_err(|err| InfraError::seed(format!("failed to seed like: {err}")))?;
            summary.likes += 1;
        }

        Ok(summary)
    }
}

/// Load the archive at `path` into `backend`.
pub async fn load_seed(backend: &MemoryBackend, path: &Path) -> Result<SeedSummary, InfraError> {
    let data = fs::read_to_string(path)?;
    let archive = SeedArchive::parse(&data)?;
    let summary = archive.apply(backend).await?;

    info!(
        target = "autostocker::infra::seed",
        path = %path.display(),
        profiles = summary.profiles,
        posts = summary.posts,
        comments = summary.comments,
        likes = summary.likes,
        "seed archive loaded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{CommentsRepo, PostsRepo, ProfilesRepo};
    use crate::domain::types::Role;

    const ARCHIVE: &str = r####"
[[profiles]]
id = "00000000-0000-0000-0000-000000000001"
username = "redazione"
role = "admin"

[[profiles]]
id = "00000000-0000-0000-0000-000000000002"
username = "marta"
avatar_url = "/media/avatars/marta.png"

[[posts]]
id = "00000000-0000-0000-0000-0000000000a1"
author_id = "00000000-0000-0000-0000-000000000001"
title = "Benvenuti"
content = "### Ciao\n**AutoStocker** apre."
created_at = "2026-10-18T14:05:00Z"

[[comments]]
id = "00000000-0000-0000-0000-0000000000c1"
post_id = "00000000-0000-0000-0000-0000000000a1"
user_id = "00000000-0000-0000-0000-000000000002"
content = "Finalmente!"
created_at = "2026-10-18T15:00:00Z"

[[comments]]
id = "00000000-0000-0000-0000-0000000000c2"
post_id = "00000000-0000-0000-0000-0000000000a1"
user_id = "00000000-0000-0000-0000-000000000001"
parent_id = "00000000-0000-0000-0000-0000000000c1"
content = "Grazie"
created_at = "2026-10-18T15:10:00Z"

[[likes]]
target = "post"
id = "00000000-0000-0000-0000-0000000000a1"
user_id = "00000000-0000-0000-0000-000000000002"

[[likes]]
target = "comment"
id = "00000000-0000-0000-0000-0000000000c1"
user_id = "00000000-0000-0000-0000-000000000001"
"####;

    #[tokio::test]
    async fn archive_populates_backend() {
        let backend = MemoryBackend::new();
        let summary = SeedArchive::parse(ARCHIVE)
            .expect("parse")
            .apply(&backend)
            .await
            .expect("apply");

        assert_eq!(
            summary,
            SeedSummary {
                profiles: 2,
                posts: 1,
                comments: 2,
                likes: 2,
            }
        );

        let admin = backend
            .find_profile(Uuid::from_u128(1))
            .await
            .expect("find")
            .expect("admin");
        assert_eq!(admin.role, Role::Admin);

        let posts = backend.list_posts().await.expect("posts");
        assert_eq!(posts[0].title, "Benvenuti");

        let comments = backend
            .list_for_post(Uuid::from_u128(0xa1))
            .await
            .expect("comments");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].parent_id, Some(Uuid::from_u128(0xc1)));

        let likers = backend
            .likers(LikeTarget::Post(Uuid::from_u128(0xa1)))
            .await
            .expect("likers");
        assert_eq!(likers, vec![Uuid::from_u128(2)]);
    }

    #[test]
    fn dangling_references_are_rejected() {
        let archive = r#"
[[comments]]
id = "00000000-0000-0000-0000-0000000000c1"
post_id = "00000000-0000-0000-0000-0000000000a1"
user_id = "00000000-0000-0000-0000-000000000002"
content = "orfano"
created_at = "2026-10-18T15:00:00Z"
"#;
        let err = SeedArchive::parse(archive).expect_err("unknown post");
        assert!(err.to_string().contains("unknown post"));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let archive = r#"
[[profiles]]
id = "00000000-0000-0000-0000-000000000001"
username = "anna"

[[profiles]]
id = "00000000-0000-0000-0000-000000000002"
username = "anna"
"#;
        let err = SeedArchive::parse(archive).expect_err("duplicate");
        assert!(err.to_string().contains("duplicate username"));
    }
}
