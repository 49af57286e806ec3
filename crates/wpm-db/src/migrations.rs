use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, sessions, wallpapers)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                name            TEXT NOT NULL DEFAULT '',
                surname         TEXT NOT NULL DEFAULT '',
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                is_admin        INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_expiry ON sessions(expires_at);

            CREATE TABLE wallpapers (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename        TEXT NOT NULL UNIQUE,
                original_name   TEXT NOT NULL,
                uploaded_at     TEXT NOT NULL,
                is_public       INTEGER NOT NULL DEFAULT 0,
                to_review       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_wallpapers_owner ON wallpapers(user_id, uploaded_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (comments)");
        conn.execute_batch(
            "
            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                wallpaper_id    INTEGER NOT NULL REFERENCES wallpapers(id) ON DELETE CASCADE,
                user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_comments_wallpaper ON comments(wallpaper_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
