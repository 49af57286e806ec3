use serde::{Deserialize, Serialize};

use crate::models::{UserIdentity, Wallpaper};

// -- Forms --
//
// Form fields default to empty so a missing field reaches the handler's own
// validation instead of being rejected by the extractor.

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub mail: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameForm {
    #[serde(default)]
    pub wallpaper_id: String,
    #[serde(default)]
    pub new_name: String,
}

/// Used by delete, toreview, publish and deny.
#[derive(Debug, Deserialize)]
pub struct WallpaperForm {
    #[serde(default)]
    pub wallpaper_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameForm {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountForm {
    #[serde(default)]
    pub user_id: String,
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub wallpaper_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub success: bool,
    pub id: i64,
}

// -- Pages --

/// Identity annotation shown on every page.
#[derive(Debug, Default, Serialize)]
pub struct PageData {
    pub username: Option<String>,
    pub is_admin: bool,
}

impl From<Option<&UserIdentity>> for PageData {
    fn from(user: Option<&UserIdentity>) -> Self {
        match user {
            Some(u) => Self {
                username: Some(u.username.clone()),
                is_admin: u.is_admin,
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WallpapersPage {
    pub wallpapers: Vec<Wallpaper>,
    pub username: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct AdminPanel {
    pub current_user: UserIdentity,
    pub users: Vec<UserIdentity>,
    pub pending_review: Vec<Wallpaper>,
}
