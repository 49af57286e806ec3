use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Redirect},
};
use tracing::{info, warn};

use wpm_types::api::{AdminPanel, DeleteAccountForm, UsernameForm};
use wpm_types::models::{UserIdentity, Wallpaper};

use crate::error::ApiError;
use crate::extract::AppForm;
use crate::guard::{self, Action};
use crate::session::CurrentUser;
use crate::state::AppState;

/// GET /adminpannel: every user plus the moderation queue.
pub async fn panel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    require(&user, Action::ViewAdminPanel)?;

    let (users, pending) = state
        .run_db(|db| Ok((db.list_users()?, db.list_wallpapers_to_review()?)))
        .await?;

    Ok(Json(AdminPanel {
        current_user: user,
        users: users.into_iter().map(UserIdentity::from).collect(),
        pending_review: pending.into_iter().map(Wallpaper::from).collect(),
    }))
}

/// POST /admin/promote
pub async fn promote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<UsernameForm>,
) -> Result<impl IntoResponse, ApiError> {
    set_role(&state, &user, form.username, true).await?;
    Ok(Redirect::to("/adminpannel"))
}

/// POST /admin/demote
pub async fn demote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<UsernameForm>,
) -> Result<impl IntoResponse, ApiError> {
    set_role(&state, &user, form.username, false).await?;
    Ok(Redirect::to("/adminpannel"))
}

async fn set_role(
    state: &AppState,
    user: &UserIdentity,
    username: String,
    is_admin: bool,
) -> Result<(), ApiError> {
    require(user, Action::ManageRoles)?;

    if username.is_empty() {
        return Err(ApiError::validation("Username missing"));
    }

    let target = username.clone();
    let matched = state
        .run_db(move |db| Ok(db.set_admin_by_username(&target, is_admin)?))
        .await?;
    if matched == 0 {
        return Err(ApiError::NotFound("User not found"));
    }

    if is_admin {
        info!("User {} promoted to admin by {}", username, user.username);
    } else {
        info!("User {} demoted by {}", username, user.username);
    }
    Ok(())
}

/// POST /admin/deleteacc
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<DeleteAccountForm>,
) -> Result<impl IntoResponse, ApiError> {
    // Non-admins are turned away before their input is looked at
    if let Err(e) = guard::require_admin(&user) {
        warn!("User {} denied account deletion: {}", user.username, e);
        return Err(e.into());
    }

    if form.user_id.is_empty() {
        return Err(ApiError::validation("User ID missing"));
    }
    let target_id: i64 = form
        .user_id
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("Invalid user ID"))?;

    require(&user, Action::DeleteAccount { target_id })?;

    let filenames = state
        .run_db(move |db| db.delete_user(target_id)?.ok_or(ApiError::NotFound("User not found")))
        .await?;

    // Rows went with the user; their files are cleaned up best effort
    for filename in &filenames {
        if let Err(e) = state.storage.delete_file(filename).await {
            warn!("Failed to remove stored file {}: {:#}", filename, e);
        }
    }

    info!(
        "User {} deleted by admin {} ({} wallpapers removed)",
        target_id,
        user.username,
        filenames.len()
    );
    Ok(Redirect::to("/adminpannel"))
}

fn require(user: &UserIdentity, action: Action) -> Result<(), ApiError> {
    guard::authorize(user, action).map_err(|e| {
        warn!("User {} denied {:?}: {}", user.username, action, e);
        ApiError::from(e)
    })
}
