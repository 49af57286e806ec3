use axum::Json;

use wpm_types::api::PageData;
use wpm_types::models::UserIdentity;

use crate::session::{CurrentUser, MaybeUser};

/// GET /
pub async fn index(MaybeUser(user): MaybeUser) -> Json<PageData> {
    Json(PageData::from(user.as_ref()))
}

/// GET /profile
pub async fn profile(CurrentUser(user): CurrentUser) -> Json<UserIdentity> {
    Json(user)
}
