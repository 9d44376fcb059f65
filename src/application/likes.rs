//! Like toggling with an optimistic per-viewer cache.
//!
//! Each (target, user) pair has a cache entry holding the count and liked
//! flag that viewer last saw. A toggle updates the entry before the store
//! write, reconciles it against the store afterwards, and restores the
//! previous entry when the write fails.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{LikesRepo, RepoError};
use crate::application::viewer::Viewer;
use crate::domain::types::LikeTarget;

/// What a viewer sees for one likeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LikeSnapshot {
    pub count: u64,
    pub liked: bool,
}

#[derive(Debug, Error)]
pub enum LikeError {
    #[error("sign in required to like content")]
    LoginRequired,
    #[error("{target} does not exist")]
    NotFound { target: LikeTarget },
    #[error("a like update for {target} is already in flight")]
    InFlight { target: LikeTarget },
    #[error("like update for {target} failed and was rolled back")]
    WriteFailed {
        target: LikeTarget,
        restored: LikeSnapshot,
        #[source]
        source: RepoError,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    snapshot: LikeSnapshot,
    pending: bool,
}

type CacheKey = (LikeTarget, Uuid);

pub struct LikeService {
    repo: Arc<dyn LikesRepo>,
    cache: DashMap<CacheKey, CacheEntry>,
}

impl LikeService {
    pub fn new(repo: Arc<dyn LikesRepo>) -> Self {
        Self {
            repo,
            cache: DashMap::new(),
        }
    }

    /// Authoritative state of `target` as seen by `viewer`.
    pub async fn snapshot(
        &self,
        target: LikeTarget,
        viewer: &Viewer,
    ) -> Result<LikeSnapshot, LikeError> {
        let likers = self.repo.likers(target).await?;
        let snapshot = snapshot_from(&likers, viewer.user_id());

        if let Some(user_id) = viewer.user_id() {
            self.reconcile(target, user_id, snapshot);
        }

        Ok(snapshot)
    }

    /// Flip the viewer's like on `target`.
    pub async fn toggle(
        &self,
        target: LikeTarget,
        viewer: &Viewer,
    ) -> Result<LikeSnapshot, LikeError> {
        let user_id = viewer.user_id().ok_or(LikeError::LoginRequired)?;
        let key = (target, user_id);

        if !self.cache.contains_key(&key) {
            let likers = self.repo.likers(target).await?;
            self.cache.entry(key).or_insert(CacheEntry {
                snapshot: snapshot_from(&likers, Some(user_id)),
                pending: false,
            });
        }

        let pending = self.begin_toggle(key)?;
        counter!("autostocker_like_toggle_total", "target" => target.kind()).increment(1);

        let write = if pending.previous.liked {
            self.repo.delete_like(target, user_id).await
        } else {
            self.repo.insert_like(target, user_id).await
        };

        match write {
            Ok(()) => {}
            Err(RepoError::NotFound) => {
                pending.discard();
                return Err(LikeError::NotFound { target });
            }
            Err(source) => {
                let restored = pending.restore();
                counter!("autostocker_like_rollback_total", "target" => target.kind())
                    .increment(1);
                warn!(
                    target = "autostocker::application::likes",
                    like_target = %target,
                    user_id = %user_id,
                    error = %source,
                    "like write failed; optimistic state rolled back"
                );
                return Err(LikeError::WriteFailed {
                    target,
                    restored,
                    source,
                });
            }
        }

        match self.repo.likers(target).await {
            Ok(likers) => {
                let snapshot = snapshot_from(&likers, Some(user_id));
                pending.settle(snapshot);
                Ok(snapshot)
            }
            Err(err) => {
                // The write landed; keep the optimistic value until the next read.
                debug!(
                    target = "autostocker::application::likes",
                    like_target = %target,
                    error = %err,
                    "like reconciliation read failed"
                );
                Ok(pending.keep())
            }
        }
    }

    /// Drop every cached entry of a target that no longer exists.
    pub fn forget(&self, target: LikeTarget) {
        self.cache.retain(|(cached, _), _| *cached != target);
    }

    /// Cached view for a viewer, if a toggle populated it.
    pub fn cached(&self, target: LikeTarget, user_id: Uuid) -> Option<LikeSnapshot> {
        self.cache.get(&(target, user_id)).map(|entry| entry.snapshot)
    }

    fn begin_toggle(&self, key: CacheKey) -> Result<PendingToggle<'_>, LikeError> {
        let mut entry = self.cache.entry(key).or_insert(CacheEntry {
            snapshot: LikeSnapshot::default(),
            pending: false,
        });
        if entry.pending {
            return Err(LikeError::InFlight { target: key.0 });
        }

        let previous = entry.snapshot;
        entry.snapshot = if previous.liked {
            LikeSnapshot {
                count: previous.count.saturating_sub(1),
                liked: false,
            }
        } else {
            LikeSnapshot {
                count: previous.count + 1,
                liked: true,
            }
        };
        entry.pending = true;
        drop(entry);

        Ok(PendingToggle {
            cache: &self.cache,
            key,
            previous,
            resolved: false,
        })
    }

    /// Refresh an entry a toggle already created. Reads never add entries.
    fn reconcile(&self, target: LikeTarget, user_id: Uuid, snapshot: LikeSnapshot) {
        if let Some(mut entry) = self.cache.get_mut(&(target, user_id))
            && !entry.pending
        {
            entry.snapshot = snapshot;
        }
    }
}

/// A cache entry held in the pending state by one toggle.
///
/// Dropping it unresolved, for example when the request future is cancelled
/// mid-write, removes the entry so the next toggle starts from the store.
struct PendingToggle<'a> {
    cache: &'a DashMap<CacheKey, CacheEntry>,
    key: CacheKey,
    previous: LikeSnapshot,
    resolved: bool,
}

impl PendingToggle<'_> {
    fn settle(mut self, snapshot: LikeSnapshot) {
        self.resolved = true;
        self.cache.insert(
            self.key,
            CacheEntry {
                snapshot,
                pending: false,
            },
        );
    }

    fn restore(self) -> LikeSnapshot {
        let previous = self.previous;
        self.settle(previous);
        previous
    }

    /// Keep the optimistic value and release the entry.
    fn keep(mut self) -> LikeSnapshot {
        self.resolved = true;
        let kept = match self.cache.get_mut(&self.key) {
            Some(mut entry) => {
                entry.pending = false;
                entry.snapshot
            }
            None => LikeSnapshot::default(),
        };
        kept
    }

    fn discard(mut self) {
        self.resolved = true;
        self.cache.remove(&self.key);
    }
}

impl Drop for PendingToggle<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.cache.remove(&self.key);
        }
    }
}

fn snapshot_from(likers: &[Uuid], user_id: Option<Uuid>) -> LikeSnapshot {
    LikeSnapshot {
        count: likers.len() as u64,
        liked: user_id.is_some_and(|id| likers.contains(&id)),
    }
}
