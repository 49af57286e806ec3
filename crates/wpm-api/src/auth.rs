use std::sync::OnceLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{error, info, warn};

use wpm_db::models::UserRow;
use wpm_types::api::{LoginForm, PageData, RegisterForm};

use crate::error::ApiError;
use crate::extract::AppForm;
use crate::session::{self, MaybeUser, SESSION_COOKIE};
use crate::state::AppState;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 100;
const MAX_NAME_LEN: usize = 50;

pub async fn register_page(MaybeUser(user): MaybeUser) -> Json<PageData> {
    Json(PageData::from(user.as_ref()))
}

pub async fn login_page(MaybeUser(user): MaybeUser) -> Json<PageData> {
    Json(PageData::from(user.as_ref()))
}

pub async fn register(
    State(state): State<AppState>,
    AppForm(form): AppForm<RegisterForm>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&form)?;

    let username = form.username.clone();
    let user_id = state
        .run_db(move |db| {
            // Argon2 is CPU-bound, hash on the blocking pool
            let password_hash = hash_password(&form.password)?;
            db.create_user(&form.username, &form.mail, &form.name, &form.surname, &password_hash)
                .map_err(|e| {
                    error!("Failed to save user {}: {:#}", form.username, e);
                    ApiError::SaveFailed("Failed to save user")
                })
        })
        .await?;

    info!("User {} registered with id {}", username, user_id);
    Ok(Redirect::to("/login"))
}

fn validate_registration(form: &RegisterForm) -> Result<(), ApiError> {
    if !USERNAME_LEN.contains(&form.username.len()) {
        return Err(ApiError::validation("Username must be 3-50 characters"));
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }
    if form.mail.len() > MAX_EMAIL_LEN {
        return Err(ApiError::validation("Email too long"));
    }
    if form.name.len() > MAX_NAME_LEN || form.surname.len() > MAX_NAME_LEN {
        return Err(ApiError::validation("Name and surname must be at most 50 characters"));
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppForm(form): AppForm<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, new_session) = state
        .run_db(move |db| {
            let found = db.get_user_by_username(&form.username)?;
            let user = check_credentials(found, &form.password).ok_or(ApiError::InvalidCredentials)?;
            let new_session = session::issue(db, user.id, Utc::now())?;
            Ok((user, new_session))
        })
        .await?;

    info!("User {} logged in, is_admin: {}", user.username, user.is_admin);

    let jar = jar.add(session::session_cookie(&new_session)?);
    Ok((jar, Redirect::to("/profile")))
}

/// Verifies `password` against the found user's hash, or against a dummy hash
/// when nobody was found, so both failures cost the same.
fn check_credentials(user: Option<UserRow>, password: &str) -> Option<UserRow> {
    let hash = match &user {
        Some(u) => u.password_hash.as_str(),
        None => dummy_hash(),
    };
    let verified = verify_password(hash, password);
    user.filter(|_| verified)
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return (jar, Redirect::to("/login"));
    };

    if let Err(e) = state.run_db(move |db| Ok(db.delete_session(&token)?)).await {
        warn!("Failed to delete session on logout: {}", e);
    }

    (jar.remove(session::removal_cookie()), Redirect::to("/login"))
}

/// Argon2id with a random salt, in PHC string format.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Unparseable password hash: {}", e);
            false
        }
    }
}

fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("not-a-real-password").unwrap_or_default())
}
