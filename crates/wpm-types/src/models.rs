use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated caller of a request, as resolved from its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallpaper {
    pub id: i64,
    pub owner_id: i64,
    /// Generated on-disk name, `{owner_id}_{uuid}.{ext}`.
    pub filename: String,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub is_public: bool,
    pub to_review: bool,
    pub visibility: Visibility,
}

/// Moderation state derived from the `is_public` / `to_review` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    PendingReview,
    Public,
}

impl Visibility {
    pub fn from_flags(is_public: bool, to_review: bool) -> Self {
        if is_public {
            Visibility::Public
        } else if to_review {
            Visibility::PendingReview
        } else {
            Visibility::Private
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub wallpaper_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
