use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Background task that deletes expired sessions.
///
/// Resolution already evicts an expired session when it is presented; this
/// catches the ones that never come back.
pub async fn run_session_sweep(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_expired_sessions(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Session sweep: removed {} expired sessions", count);
                }
            }
            Err(e) => {
                warn!("Session sweep error: {}", e);
            }
        }
    }
}

pub async fn sweep_expired_sessions(state: &AppState) -> Result<usize, ApiError> {
    state
        .run_db(|db| Ok(db.delete_expired_sessions(Utc::now())?))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppStateInner;
    use crate::storage::Storage;
    use chrono::Duration as ChronoDuration;
    use wpm_db::Database;

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).await.unwrap();
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), storage);

        let user = state.db.create_user("alice", "a@x.com", "", "", "h").unwrap();
        let now = Utc::now();
        state.db.create_session("stale", user, now - ChronoDuration::minutes(1)).unwrap();
        state.db.create_session("fresh", user, now + ChronoDuration::hours(1)).unwrap();

        assert_eq!(sweep_expired_sessions(&state).await.unwrap(), 1);
        assert!(state.db.get_session("stale").unwrap().is_none());
        assert!(state.db.get_session("fresh").unwrap().is_some());
    }
}
