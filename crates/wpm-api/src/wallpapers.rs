use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    response::{IntoResponse, Redirect},
};
use chrono::Utc;
use tracing::{error, info, warn};

use wpm_db::Database;
use wpm_types::api::{RenameForm, WallpaperForm, WallpapersPage};
use wpm_types::models::{UserIdentity, Wallpaper};

use crate::error::ApiError;
use crate::extract::{AppForm, AppMultipart};
use crate::guard::{self, Action, WallpaperOp};
use crate::session::{CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::storage;

const MAX_NAME_LEN: usize = 255;
const UPLOAD_FIELD: &str = "wallpaper";
const READ_FAILED: &str = "Failed to read file";

/// GET /wallpapers: the caller's own wallpapers, newest first.
pub async fn list_own(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = user.id;
    let rows = state
        .run_db(move |db| Ok(db.list_wallpapers_by_owner(owner_id)?))
        .await?;

    Ok(Json(WallpapersPage {
        wallpapers: rows.into_iter().map(Wallpaper::from).collect(),
        username: Some(user.username),
        is_admin: user.is_admin,
    }))
}

/// GET /community: every public wallpaper.
pub async fn community(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.run_db(|db| Ok(db.list_public_wallpapers()?)).await?;

    Ok(Json(WallpapersPage {
        wallpapers: rows.into_iter().map(Wallpaper::from).collect(),
        username: user.as_ref().map(|u| u.username.clone()),
        is_admin: user.is_some_and(|u| u.is_admin),
    }))
}

/// POST /upload: multipart form with a single `wallpaper` file field.
pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<impl IntoResponse, ApiError> {
    guard::authorize(&user, Action::Upload)?;

    let (original_name, data) = read_upload(&mut multipart).await?;
    let id = store_wallpaper(&state, user.id, &original_name, &data).await?;

    info!("Wallpaper {} ({}) uploaded by user {}", id, original_name, user.id);
    Ok(Redirect::to("/wallpapers"))
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(unreadable_upload)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(unreadable_upload)?;
        return Ok((original_name, data));
    }

    Err(ApiError::validation(READ_FAILED))
}

fn unreadable_upload(e: MultipartError) -> ApiError {
    warn!("Failed to read upload: {}", e);
    ApiError::validation(READ_FAILED)
}

/// Returns the whitelisted, lower-cased extension.
fn validate_upload(original_name: &str, data: &[u8]) -> Result<String, ApiError> {
    if original_name.is_empty() {
        return Err(ApiError::validation("Missing file name"));
    }
    if original_name.len() > MAX_NAME_LEN {
        return Err(ApiError::validation("Filename too long"));
    }
    if data.is_empty() {
        return Err(ApiError::validation("Empty file"));
    }
    storage::allowed_extension(original_name)
        .ok_or_else(|| ApiError::validation("Invalid file type. Only images allowed"))
}

/// Writes the file first and inserts the row only once the bytes are on
/// disk. If the insert then fails the file is removed again, so a stored
/// file never outlives a failed upload.
pub async fn store_wallpaper(
    state: &AppState,
    owner_id: i64,
    original_name: &str,
    data: &[u8],
) -> Result<i64, ApiError> {
    let ext = validate_upload(original_name, data)?;
    let filename = storage::generate_filename(owner_id, &ext);

    state.storage.write_file(&filename, data).await.map_err(|e| {
        error!("Failed to write {}: {:#}", filename, e);
        ApiError::SaveFailed("Failed to save file")
    })?;

    let inserted = {
        let filename = filename.clone();
        let original_name = original_name.to_string();
        state
            .run_db(move |db| {
                Ok(db.insert_wallpaper(owner_id, &filename, &original_name, Utc::now())?)
            })
            .await
    };

    match inserted {
        Ok(id) => Ok(id),
        Err(e) => {
            error!("Failed to save wallpaper {} to DB: {}", filename, e);
            if let Err(cleanup) = state.storage.delete_file(&filename).await {
                warn!("Orphaned upload {} left behind: {:#}", filename, cleanup);
            }
            Err(ApiError::SaveFailed("Failed to save wallpaper"))
        }
    }
}

/// POST /rename
pub async fn rename(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<RenameForm>,
) -> Result<impl IntoResponse, ApiError> {
    if form.wallpaper_id.is_empty() || form.new_name.is_empty() {
        return Err(ApiError::validation("Missing wallpaper ID or new name"));
    }
    if form.new_name.len() > MAX_NAME_LEN {
        return Err(ApiError::validation("Name too long (max 255 characters)"));
    }
    let wallpaper_id = parse_wallpaper_id(&form.wallpaper_id)?;

    let user_id = user.id;
    let new_name = form.new_name;
    let logged_name = new_name.clone();
    guarded_update(&state, user, wallpaper_id, WallpaperOp::Rename, move |db, owner| {
        Ok(applied(db.rename_wallpaper(wallpaper_id, owner, &new_name)?))
    })
    .await?;

    info!("Wallpaper {} renamed to {} by user {}", wallpaper_id, logged_name, user_id);
    Ok(Redirect::to("/wallpapers"))
}

/// POST /deletewp
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<WallpaperForm>,
) -> Result<impl IntoResponse, ApiError> {
    let wallpaper_id = parse_wallpaper_id(&form.wallpaper_id)?;

    let user_id = user.id;
    let filename = guarded_update(&state, user, wallpaper_id, WallpaperOp::Delete, move |db, owner| {
        Ok(db.delete_wallpaper(wallpaper_id, owner)?)
    })
    .await?;

    // The row is gone; a leftover file is only logged
    if let Err(e) = state.storage.delete_file(&filename).await {
        warn!("Failed to remove stored file {}: {:#}", filename, e);
    }

    info!("Wallpaper {} deleted by user {}", wallpaper_id, user_id);
    Ok(Redirect::to("/wallpapers"))
}

/// POST /toreview: private to pending review.
pub async fn request_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<WallpaperForm>,
) -> Result<impl IntoResponse, ApiError> {
    let wallpaper_id = parse_wallpaper_id(&form.wallpaper_id)?;

    let user_id = user.id;
    guarded_update(&state, user, wallpaper_id, WallpaperOp::Moderate, move |db, owner| {
        Ok(applied(db.request_review(wallpaper_id, owner)?))
    })
    .await?;

    info!("Wallpaper {} submitted for review by user {}", wallpaper_id, user_id);
    Ok(Redirect::to("/wallpapers"))
}

/// POST /publish
pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<WallpaperForm>,
) -> Result<impl IntoResponse, ApiError> {
    let wallpaper_id = parse_wallpaper_id(&form.wallpaper_id)?;

    let user_id = user.id;
    guarded_update(&state, user, wallpaper_id, WallpaperOp::Moderate, move |db, owner| {
        Ok(applied(db.publish_wallpaper(wallpaper_id, owner)?))
    })
    .await?;

    info!("Wallpaper {} published by user {}", wallpaper_id, user_id);
    Ok(Redirect::to("/adminpannel"))
}

/// POST /denypublish: clears the review flag, whatever it was.
pub async fn deny(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppForm(form): AppForm<WallpaperForm>,
) -> Result<impl IntoResponse, ApiError> {
    let wallpaper_id = parse_wallpaper_id(&form.wallpaper_id)?;

    let user_id = user.id;
    guarded_update(&state, user, wallpaper_id, WallpaperOp::Moderate, move |db, owner| {
        Ok(applied(db.deny_wallpaper(wallpaper_id, owner)?))
    })
    .await?;

    info!("Wallpaper {} denied by user {}", wallpaper_id, user_id);
    Ok(Redirect::to("/adminpannel"))
}

fn parse_wallpaper_id(raw: &str) -> Result<i64, ApiError> {
    if raw.is_empty() {
        return Err(ApiError::validation("Wallpaper ID missing"));
    }
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation("Invalid wallpaper ID"))
}

fn applied(rows: usize) -> Option<()> {
    (rows > 0).then_some(())
}

/// Runs a single conditional mutation scoped by the guard's owner filter.
///
/// `update` returns `None` when no row matched. Only then is the owner read,
/// to tell a missing wallpaper (404) from someone else's (403). A row that
/// the guard would allow but that did not match was deleted in between and
/// is reported as missing.
async fn guarded_update<F, T>(
    state: &AppState,
    user: UserIdentity,
    wallpaper_id: i64,
    op: WallpaperOp,
    update: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&Database, Option<i64>) -> Result<Option<T>, ApiError> + Send + 'static,
    T: Send + 'static,
{
    state
        .run_db(move |db| {
            if let Some(out) = update(db, guard::owner_filter(&user, op))? {
                return Ok(out);
            }

            let Some(owner_id) = db.get_wallpaper_owner(wallpaper_id)? else {
                return Err(ApiError::NotFound("Wallpaper not found"));
            };

            if let Err(e) = guard::authorize(&user, Action::Wallpaper { op, owner_id }) {
                warn!(
                    "Unauthorized {:?} attempt: user {} on wallpaper {} owned by {}",
                    op, user.id, wallpaper_id, owner_id
                );
                return Err(e.into());
            }

            Err(ApiError::NotFound("Wallpaper not found"))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppStateInner;
    use crate::storage::Storage;

    async fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();
        let db = Database::open_in_memory().unwrap();
        (AppStateInner::new(db, storage), dir)
    }

    fn stored_files(state: &AppState) -> Vec<String> {
        std::fs::read_dir(state.storage.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_validate_upload() {
        assert_eq!(validate_upload("a.PNG", b"x").unwrap(), "png");
        assert!(validate_upload("a.exe", b"x").is_err());
        assert!(validate_upload("a.png", b"").is_err());
        assert!(validate_upload("", b"x").is_err());
        let long = format!("{}.png", "a".repeat(252));
        assert!(validate_upload(&long, b"x").is_err());
    }

    #[test]
    fn test_parse_wallpaper_id() {
        assert_eq!(parse_wallpaper_id("42").unwrap(), 42);
        assert!(parse_wallpaper_id("").is_err());
        assert!(parse_wallpaper_id("4x").is_err());
    }

    #[tokio::test]
    async fn test_store_wallpaper_writes_file_and_row() {
        let (state, _dir) = test_state().await;
        let owner = state.db.create_user("alice", "a@x.com", "", "", "h").unwrap();

        let id = store_wallpaper(&state, owner, "sunset.png", b"png-bytes").await.unwrap();

        let rows = state.db.list_wallpapers_by_owner(owner).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(stored_files(&state), vec![rows[0].filename.clone()]);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_written_file() {
        let (state, _dir) = test_state().await;

        // No such owner: the foreign key rejects the row after the write
        let err = store_wallpaper(&state, 404, "sunset.png", b"png-bytes").await.unwrap_err();

        assert!(matches!(err, ApiError::SaveFailed(_)));
        assert!(stored_files(&state).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_upload_writes_nothing() {
        let (state, _dir) = test_state().await;
        let owner = state.db.create_user("alice", "a@x.com", "", "", "h").unwrap();

        let err = store_wallpaper(&state, owner, "notes.txt", b"text").await.unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert!(stored_files(&state).is_empty());
    }
}
