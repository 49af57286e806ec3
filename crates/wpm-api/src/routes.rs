use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, auth, comments, pages, wallpapers};

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let uploads = ServeDir::new(state.storage.dir());

    Router::new()
        .route("/", get(pages::index))
        .route("/profile", get(pages::profile))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/community", get(wallpapers::community))
        .route("/wallpapers", get(wallpapers::list_own))
        .route("/upload", post(wallpapers::upload))
        .route("/rename", post(wallpapers::rename))
        .route("/deletewp", post(wallpapers::delete))
        .route("/toreview", post(wallpapers::request_review))
        .route("/publish", post(wallpapers::publish))
        .route("/denypublish", post(wallpapers::deny))
        .route("/adminpannel", get(admin::panel))
        .route("/admin/promote", post(admin::promote))
        .route("/admin/demote", post(admin::demote))
        .route("/admin/deleteacc", post(admin::delete_account))
        .route("/api/comments", post(comments::post_comment))
        .route("/api/comments/{wallpaper_id}", get(comments::list_comments))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
