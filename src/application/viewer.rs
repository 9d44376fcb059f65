//! The identity an action is performed as.

use uuid::Uuid;

use crate::application::error::ActionError;
use crate::application::repos::ProfilesRepo;
use crate::domain::entities::ProfileRecord;

/// Resolved identity of the caller. Anonymous viewers can read but not write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    user_id: Option<Uuid>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn require_user(&self) -> Result<Uuid, ActionError> {
        self.user_id.ok_or(ActionError::LoginRequired)
    }
}

/// Load the signed-in viewer's profile. A viewer without a profile row is
/// treated as not signed in.
pub(crate) async fn acting_profile(
    profiles: &dyn ProfilesRepo,
    viewer: &Viewer,
) -> Result<ProfileRecord, ActionError> {
    let user_id = viewer.require_user()?;
    profiles
        .find_profile(user_id)
        .await?
        .ok_or(ActionError::LoginRequired)
}

/// Load the viewer's profile and require the admin role.
pub(crate) async fn require_admin(
    profiles: &dyn ProfilesRepo,
    viewer: &Viewer,
    action: &'static str,
) -> Result<ProfileRecord, ActionError> {
    let profile = acting_profile(profiles, viewer).await?;
    if !profile.role.is_admin() {
        return Err(ActionError::Forbidden(action));
    }
    Ok(profile)
}

/// Whether the viewer is signed in with an admin profile.
pub(crate) async fn is_admin(
    profiles: &dyn ProfilesRepo,
    viewer: &Viewer,
) -> Result<bool, ActionError> {
    let Some(user_id) = viewer.user_id() else {
        return Ok(false);
    };
    Ok(profiles
        .find_profile(user_id)
        .await?
        .is_some_and(|profile| profile.role.is_admin()))
}
