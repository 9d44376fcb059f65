use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::error::ActionError;
use crate::application::repos::ProfilesRepo;
use crate::application::viewer::{Viewer, acting_profile};
use crate::domain::entities::ProfileRecord;
use crate::infra::media::{MediaKind, MediaStorage};

/// Outcome of a username change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "profile", rename_all = "snake_case")]
pub enum UsernameUpdate {
    Unchanged(ProfileRecord),
    Updated(ProfileRecord),
}

impl UsernameUpdate {
    pub fn profile(&self) -> &ProfileRecord {
        match self {
            UsernameUpdate::Unchanged(profile) | UsernameUpdate::Updated(profile) => profile,
        }
    }
}

#[derive(Clone)]
pub struct ProfileService {
    profiles: Arc<dyn ProfilesRepo>,
    media: Arc<MediaStorage>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfilesRepo>, media: Arc<MediaStorage>) -> Self {
        Self { profiles, media }
    }

    pub async fn me(&self, viewer: &Viewer) -> Result<ProfileRecord, ActionError> {
        let user_id = viewer.require_user()?;
        self.profiles
            .find_profile(user_id)
            .await?
            .ok_or_else(|| ActionError::not_found("profile"))
    }

    pub async fn update_username(
        &self,
        viewer: &Viewer,
        username: &str,
    ) -> Result<UsernameUpdate, ActionError> {
        let current = self.me(viewer).await?;
        let username = username.trim();
        if username.is_empty() {
            return Err(ActionError::validation("username must not be blank"));
        }
        if username == current.username {
            return Ok(UsernameUpdate::Unchanged(current));
        }

        let updated = self.profiles.update_username(current.id, username).await?;
        info!(
            target = "autostocker::application::profiles",
            user_id = %updated.id,
            "username updated"
        );
        Ok(UsernameUpdate::Updated(updated))
    }

    /// Store a new avatar and point the profile at it. The previous avatar is
    /// removed when it lives in this media store.
    pub async fn replace_avatar(
        &self,
        viewer: &Viewer,
        file_name: &str,
        data: Bytes,
    ) -> Result<ProfileRecord, ActionError> {
        let current = acting_profile(self.profiles.as_ref(), viewer).await?;

        let stored = self
            .media
            .store(MediaKind::Avatar, current.id, file_name, data)
            .await?;
        let updated = match self
            .profiles
            .update_avatar(current.id, Some(stored.public_url.clone()))
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                if let Err(cleanup) = self.media.delete(&stored.stored_path).await {
                    warn!(
                        target = "autostocker::application::profiles",
                        user_id = %current.id,
                        stored_path = %stored.stored_path,
                        error = %cleanup,
                        "failed to remove avatar after profile update failed"
                    );
                }
                return Err(err.into());
            }
        };

        if let Some(previous) = current
            .avatar_url
            .as_deref()
            .and_then(|url| self.media.stored_path_from_url(url))
            .filter(|stored| MediaKind::Avatar.contains(stored))
            && let Err(err) = self.media.delete(&previous).await
        {
            warn!(
                target = "autostocker::application::profiles",
                user_id = %current.id,
                stored_path = %previous,
                error = %err,
                "failed to remove previous avatar"
            );
        }

        info!(
            target = "autostocker::application::profiles",
            user_id = %updated.id,
            stored_path = %stored.stored_path,
            "avatar replaced"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;
    use crate::domain::types::Role;
    use crate::infra::memory::MemoryBackend;
    use async_trait::async_trait;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Profiles that can be read but whose avatar never saves.
    struct ReadOnlyProfiles(Arc<MemoryBackend>);

    #[async_trait]
    impl ProfilesRepo for ReadOnlyProfiles {
        async fn find_profile(&self, id: Uuid) -> Result<Option<ProfileRecord>, RepoError> {
            self.0.find_profile(id).await
        }

        async fn update_username(
            &self,
            id: Uuid,
            username: &str,
        ) -> Result<ProfileRecord, RepoError> {
            self.0.update_username(id, username).await
        }

        async fn update_avatar(
            &self,
            _id: Uuid,
            _avatar_url: Option<String>,
        ) -> Result<ProfileRecord, RepoError> {
            Err(RepoError::Persistence("read-only replica".into()))
        }
    }

    fn fixture() -> (TempDir, Arc<MemoryBackend>, Arc<MediaStorage>, ProfileService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let media =
            Arc::new(MediaStorage::new(dir.path().join("media"), "/media").expect("media"));
        let backend = Arc::new(MemoryBackend::new());
        let service = ProfileService::new(backend.clone(), media.clone());
        (dir, backend, media, service)
    }

    fn profile(username: &str) -> ProfileRecord {
        ProfileRecord {
            id: Uuid::new_v4(),
            username: username.into(),
            role: Role::User,
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn me_requires_login_and_profile() {
        let (_dir, _backend, _media, service) = fixture();
        assert!(matches!(
            service.me(&Viewer::anonymous()).await,
            Err(ActionError::LoginRequired)
        ));
        assert!(matches!(
            service.me(&Viewer::signed_in(Uuid::new_v4())).await,
            Err(ActionError::NotFound { entity: "profile" })
        ));
    }

    #[tokio::test]
    async fn username_update_outcomes() {
        let (_dir, backend, _media, service) = fixture();
        let id = backend.insert_profile(profile("anna"));
        backend.insert_profile(profile("bruno"));
        let viewer = Viewer::signed_in(id);

        let unchanged = service
            .update_username(&viewer, "  anna ")
            .await
            .expect("same name");
        assert!(matches!(unchanged, UsernameUpdate::Unchanged(_)));

        let err = service
            .update_username(&viewer, "   ")
            .await
            .expect_err("blank");
        assert!(matches!(err, ActionError::Validation(_)));

        let err = service
            .update_username(&viewer, "bruno")
            .await
            .expect_err("taken");
        assert!(matches!(err, ActionError::Conflict(_)));

        let updated = service
            .update_username(&viewer, "anna_b")
            .await
            .expect("update");
        assert_eq!(updated.profile().username, "anna_b");
    }

    #[tokio::test]
    async fn replacing_avatar_removes_previous_file() {
        let (_dir, backend, media, service) = fixture();
        let id = backend.insert_profile(profile("anna"));
        let viewer = Viewer::signed_in(id);

        let first = service
            .replace_avatar(&viewer, "me.png", Bytes::from_static(b"one"))
            .await
            .expect("first avatar");
        let first_url = first.avatar_url.clone().expect("avatar url");
        let first_path = media.stored_path_from_url(&first_url).expect("own url");

        let second = service
            .replace_avatar(&viewer, "me.jpg", Bytes::from_static(b"two"))
            .await
            .expect("second avatar");
        assert_ne!(second.avatar_url, first.avatar_url);
        assert!(media.read(&first_path).await.is_err());

        let err = service
            .replace_avatar(&viewer, "me.pdf", Bytes::from_static(b"%PDF"))
            .await
            .expect_err("not an image");
        assert!(matches!(err, ActionError::Media(_)));
    }

    #[tokio::test]
    async fn failed_profile_update_removes_new_avatar() {
        let (dir, backend, media, _service) = fixture();
        let id = backend.insert_profile(profile("anna"));
        let service = ProfileService::new(Arc::new(ReadOnlyProfiles(backend)), media);

        let err = service
            .replace_avatar(&Viewer::signed_in(id), "me.png", Bytes::from_static(b"png"))
            .await
            .expect_err("update fails");
        assert!(matches!(err, ActionError::Repo(RepoError::Persistence(_))));

        let avatars = dir.path().join("media").join(MediaKind::Avatar.directory());
        let leftover = std::fs::read_dir(&avatars)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn previous_avatar_outside_avatar_directory_is_kept() {
        let (_dir, backend, media, service) = fixture();
        let cover = media
            .store(
                MediaKind::Cover,
                Uuid::new_v4(),
                "cover.png",
                Bytes::from_static(b"cover"),
            )
            .await
            .expect("cover");
        let mut record = profile("anna");
        record.avatar_url = Some(cover.public_url.clone());
        let id = backend.insert_profile(record);

        service
            .replace_avatar(&Viewer::signed_in(id), "me.png", Bytes::from_static(b"png"))
            .await
            .expect("avatar");
        assert!(media.read(&cover.stored_path).await.is_ok());
    }
}
