use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use wpm_types::api::{CommentCreated, CommentRequest};
use wpm_types::models::Comment;

use crate::error::ApiError;
use crate::extract::AppJson;
use crate::session::ApiUser;
use crate::state::AppState;

const MAX_COMMENT_LEN: usize = 500;

/// GET /api/comments/{wallpaper_id}
pub async fn list_comments(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let wallpaper_id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::validation("Invalid wallpaper ID"))?;

    let rows = state
        .run_db(move |db| Ok(db.list_comments(wallpaper_id)?))
        .await?;

    Ok(Json(rows.into_iter().map(Comment::from).collect::<Vec<_>>()))
}

/// POST /api/comments. A missing session is a 401, not a redirect.
pub async fn post_comment(
    State(state): State<AppState>,
    ApiUser(user): ApiUser,
    AppJson(req): AppJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.wallpaper_id <= 0 {
        return Err(ApiError::validation("Invalid wallpaper ID"));
    }
    if req.text.is_empty() || req.text.len() > MAX_COMMENT_LEN {
        return Err(ApiError::validation("Comment must be 1-500 characters"));
    }

    let user_id = user.id;
    let wallpaper_id = req.wallpaper_id;
    let id = state
        .run_db(move |db| {
            if !db.wallpaper_exists(wallpaper_id)? {
                return Err(ApiError::NotFound("Wallpaper not found"));
            }
            Ok(db.insert_comment(wallpaper_id, user_id, &req.text, Utc::now())?)
        })
        .await?;

    info!("Comment {} posted by user {} on wallpaper {}", id, user_id, wallpaper_id);
    Ok((StatusCode::CREATED, Json(CommentCreated { success: true, id })))
}
