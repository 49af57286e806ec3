//! Database row types. These map directly to SQLite rows and convert into
//! the wpm-types models at the crate boundary.

use chrono::{DateTime, Utc};
use wpm_types::models::{Comment, UserIdentity, Visibility, Wallpaper};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub password_hash: String,
    pub is_admin: bool,
}

pub struct SessionRow {
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

pub struct WallpaperRow {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub is_public: bool,
    pub to_review: bool,
}

pub struct CommentRow {
    pub id: i64,
    pub wallpaper_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            name: row.name,
            surname: row.surname,
            is_admin: row.is_admin,
        }
    }
}

impl From<WallpaperRow> for Wallpaper {
    fn from(row: WallpaperRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.user_id,
            filename: row.filename,
            original_name: row.original_name,
            uploaded_at: row.uploaded_at,
            is_public: row.is_public,
            to_review: row.to_review,
            visibility: Visibility::from_flags(row.is_public, row.to_review),
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            wallpaper_id: row.wallpaper_id,
            user_id: row.user_id,
            username: row.username,
            text: row.text,
            created_at: row.created_at,
        }
    }
}
