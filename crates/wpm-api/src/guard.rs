//! Authorization rules for mutating requests.
//!
//! Every rule takes an already-resolved identity; unauthenticated requests
//! are turned away by the session extractors before they get here.

use thiserror::Error;
use wpm_types::models::UserIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallpaperOp {
    Rename,
    Delete,
    /// Request review, publish or deny.
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    Wallpaper { op: WallpaperOp, owner_id: i64 },
    ManageRoles,
    DeleteAccount { target_id: i64 },
    ViewAdminPanel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("You do not own this wallpaper")]
    NotOwner,
    #[error("Admin access required")]
    AdminRequired,
    #[error("You cannot delete yourself")]
    SelfDeletion,
}

pub fn authorize(identity: &UserIdentity, action: Action) -> Result<(), AuthError> {
    match action {
        Action::Upload => Ok(()),
        Action::Wallpaper { op, owner_id } => match owner_filter(identity, op) {
            Some(required) if required != owner_id => Err(AuthError::NotOwner),
            _ => Ok(()),
        },
        Action::ManageRoles | Action::ViewAdminPanel => require_admin(identity),
        Action::DeleteAccount { target_id } => {
            // Applies to admins too
            if target_id == identity.id {
                return Err(AuthError::SelfDeletion);
            }
            require_admin(identity)
        }
    }
}

/// The owner a wallpaper row must have for `identity` to apply `op` to it,
/// or `None` when any owner will do. Feeds the conditional update that
/// performs the mutation, so check and write happen in one statement.
pub fn owner_filter(identity: &UserIdentity, op: WallpaperOp) -> Option<i64> {
    match op {
        WallpaperOp::Moderate if identity.is_admin => None,
        _ => Some(identity.id),
    }
}

/// The role half of the admin-only rules, for callers that have not yet
/// parsed their target.
pub fn require_admin(identity: &UserIdentity) -> Result<(), AuthError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(AuthError::AdminRequired)
    }
}
