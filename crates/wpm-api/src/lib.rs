pub mod admin;
pub mod auth;
pub mod cleanup;
pub mod comments;
pub mod error;
pub mod extract;
pub mod guard;
pub mod pages;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod wallpapers;

pub use state::{AppState, AppStateInner};
