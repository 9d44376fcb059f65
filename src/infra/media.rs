//! Filesystem-backed storage for cover images and avatars.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("unsupported media type `{content_type}`")]
    UnsupportedType { content_type: String },
}

/// Purpose of a stored image; each kind lives in its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Cover,
    Avatar,
}

impl MediaKind {
    pub fn directory(self) -> &'static str {
        match self {
            MediaKind::Cover => "covers",
            MediaKind::Avatar => "avatars",
        }
    }

    /// Whether `stored_path` lies in this kind's directory.
    pub fn contains(self, stored_path: &str) -> bool {
        stored_path
            .strip_prefix(self.directory())
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub stored_path: String,
    pub public_url: String,
    pub content_type: String,
    pub checksum: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
    public_path: String,
}

impl MediaStorage {
    /// Initialise storage rooted at `root`, creating the directory if needed.
    /// Stored files are published below `public_path`.
    pub fn new(root: PathBuf, public_path: &str) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_path: normalize_public_path(public_path),
        })
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Store an uploaded image for `owner`. Only `image/*` types are accepted.
    pub async fn store(
        &self,
        kind: MediaKind,
        owner: Uuid,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredMedia, MediaStorageError> {
        if data.is_empty() {
            return Err(MediaStorageError::EmptyPayload);
        }

        let content_type = content_type_for(original_name);
        if !content_type.starts_with("image/") {
            return Err(MediaStorageError::UnsupportedType { content_type });
        }

        let stored_path = build_stored_path(kind, owner, original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        let public_url = self.public_url(&stored_path);

        Ok(StoredMedia {
            stored_path,
            public_url,
            content_type,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored file. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaStorageError::Io(err)),
        }
    }

    pub fn public_url(&self, stored_path: &str) -> String {
        format!("{}/{}", self.public_path, stored_path)
    }

    /// Map a public URL back to its stored path when it belongs to this store.
    pub fn stored_path_from_url(&self, url: &str) -> Option<String> {
        let path = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .map(|rest| rest.find('/').map_or("", |index| &rest[index..]))
            .unwrap_or(url);
        let relative = path.strip_prefix(&self.public_path)?.strip_prefix('/')?;
        if relative.is_empty() || self.resolve(relative).is_err() {
            return None;
        }
        Some(relative.to_string())
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(MediaStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

/// Guessed MIME type for a file name, `application/octet-stream` when unknown.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn build_stored_path(kind: MediaKind, owner: Uuid, original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    match file_extension(original_name) {
        Some(ext) => format!("{}/{owner}-{identifier}.{ext}", kind.directory()),
        None => format!("{}/{owner}-{identifier}", kind.directory()),
    }
}

fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn normalize_public_path(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn kind_contains_only_its_directory() {
        assert!(MediaKind::Cover.contains("covers/a.png"));
        assert!(!MediaKind::Cover.contains("avatars/a.png"));
        assert!(!MediaKind::Cover.contains("coversx/a.png"));
        assert!(!MediaKind::Avatar.contains("avatars/"));
    }

    fn storage(dir: &Path) -> MediaStorage {
        MediaStorage::new(dir.join("media"), "/media/").expect("storage")
    }

    #[tokio::test]
    async fn store_writes_file_and_builds_public_url() {
        let dir = tempdir().expect("tempdir");
        let storage = storage(dir.path());
        let owner = Uuid::new_v4();

        let stored = storage
            .store(MediaKind::Avatar, owner, "Me.PNG", Bytes::from_static(b"png-bytes"))
            .await
            .expect("store");

        assert!(stored.stored_path.starts_with(&format!("avatars/{owner}-")));
        assert!(stored.stored_path.ends_with(".png"));
        assert_eq!(stored.public_url, format!("/media/{}", stored.stored_path));
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(stored.size_bytes, 9);
        assert_eq!(stored.checksum.len(), 64);

        let read = storage.read(&stored.stored_path).await.expect("read");
        assert_eq!(&read[..], b"png-bytes");
    }

    #[tokio::test]
    async fn store_rejects_non_images_and_empty_payloads() {
        let dir = tempdir().expect("tempdir");
        let storage = storage(dir.path());
        let owner = Uuid::new_v4();

        let err = storage
            .store(MediaKind::Cover, owner, "notes.txt", Bytes::from_static(b"hi"))
            .await
            .expect_err("text is not an image");
        assert!(matches!(err, MediaStorageError::UnsupportedType { ref content_type } if content_type == "text/plain"));

        let err = storage
            .store(MediaKind::Cover, owner, "cover.jpg", Bytes::new())
            .await
            .expect_err("empty payload");
        assert!(matches!(err, MediaStorageError::EmptyPayload));
    }

    #[tokio::test]
    async fn delete_ignores_missing_files() {
        let dir = tempdir().expect("tempdir");
        let storage = storage(dir.path());
        storage
            .delete("covers/missing.png")
            .await
            .expect("missing file is fine");
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let storage = storage(dir.path());
        assert!(matches!(
            storage.resolve("../secret"),
            Err(MediaStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.resolve("/etc/passwd"),
            Err(MediaStorageError::InvalidPath)
        ));
    }

    #[test]
    fn stored_path_from_url_only_accepts_own_urls() {
        let dir = tempdir().expect("tempdir");
        let storage = storage(dir.path());

        assert_eq!(
            storage.stored_path_from_url("/media/avatars/a.png"),
            Some("avatars/a.png".to_string())
        );
        assert_eq!(
            storage.stored_path_from_url("https://blog.example.com/media/covers/b.jpg"),
            Some("covers/b.jpg".to_string())
        );
        assert_eq!(
            storage.stored_path_from_url("https://cdn.example.com/avatars/a.png"),
            None
        );
        assert_eq!(storage.stored_path_from_url("/media/../etc/passwd"), None);
    }
}
