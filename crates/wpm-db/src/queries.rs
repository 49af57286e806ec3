use crate::Database;
use crate::models::{CommentRow, SessionRow, UserRow, WallpaperRow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str = "id, username, email, name, surname, password_hash, is_admin";
const WALLPAPER_COLUMNS: &str =
    "id, user_id, filename, original_name, uploaded_at, is_public, to_review";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        name: &str,
        surname: &str,
        password_hash: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, name, surname, password_hash) VALUES (?1, ?2, ?3, ?4, ?5)",
                (username, email, name, surname, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], user_from_row).optional()
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the number of matched rows. SQLite counts a row that already
    /// held the value, so demoting a non-admin still reports 1.
    pub fn set_admin_by_username(&self, username: &str, is_admin: bool) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_admin = ?1 WHERE username = ?2",
                params![is_admin, username],
            )?;
            Ok(n)
        })
    }

    /// Deletes a user and (by cascade) their sessions, wallpapers and comments.
    /// Returns the stored filenames of the removed wallpapers, or `None` when
    /// no such user existed.
    pub fn delete_user(&self, id: i64) -> Result<Option<Vec<String>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let filenames = {
                let mut stmt = tx.prepare("SELECT filename FROM wallpapers WHERE user_id = ?1")?;
                let names = stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                names
            };

            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;

            Ok((deleted > 0).then_some(filenames))
        })
    }

    // -- Sessions --

    pub fn create_session(&self, token: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, expires_at FROM sessions WHERE id = ?1",
                [token],
                |row| {
                    Ok(SessionRow {
                        user_id: row.get(0)?,
                        expires_at: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, token: &str) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [token])?))
    }

    pub fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])?)
        })
    }

    // -- Wallpapers --

    pub fn insert_wallpaper(
        &self,
        user_id: i64,
        filename: &str,
        original_name: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wallpapers (user_id, filename, original_name, uploaded_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, filename, original_name, uploaded_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_wallpapers_by_owner(&self, user_id: i64) -> Result<Vec<WallpaperRow>> {
        self.with_conn(|conn| {
            query_wallpapers(conn, "WHERE user_id = ?1", params![user_id])
        })
    }

    pub fn list_public_wallpapers(&self) -> Result<Vec<WallpaperRow>> {
        self.with_conn(|conn| query_wallpapers(conn, "WHERE is_public = 1", params![]))
    }

    pub fn list_wallpapers_to_review(&self) -> Result<Vec<WallpaperRow>> {
        self.with_conn(|conn| query_wallpapers(conn, "WHERE to_review = 1", params![]))
    }

    pub fn get_wallpaper_owner(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT user_id FROM wallpapers WHERE id = ?1", [id], |row| row.get(0))
                .optional()
        })
    }

    // The mutations below take an `owner` filter: `Some(id)` only touches a
    // row owned by `id`, `None` touches the row whoever owns it. The returned
    // row count is therefore both the existence and the ownership check.

    pub fn rename_wallpaper(&self, id: i64, owner: Option<i64>, new_name: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wallpapers SET original_name = ?3
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![id, owner, new_name],
            )?;
            Ok(n)
        })
    }

    /// Returns the stored filename of the deleted row.
    pub fn delete_wallpaper(&self, id: i64, owner: Option<i64>) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "DELETE FROM wallpapers
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)
                 RETURNING filename",
                params![id, owner],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Private -> pending review.
    pub fn request_review(&self, id: i64, owner: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wallpapers SET to_review = 1
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![id, owner],
            )?;
            Ok(n)
        })
    }

    pub fn publish_wallpaper(&self, id: i64, owner: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wallpapers SET is_public = 1, to_review = 0
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![id, owner],
            )?;
            Ok(n)
        })
    }

    /// Clears the review flag whatever its current value.
    pub fn deny_wallpaper(&self, id: i64, owner: Option<i64>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE wallpapers SET to_review = 0
                 WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
                params![id, owner],
            )?;
            Ok(n)
        })
    }

    // -- Comments --

    pub fn wallpaper_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM wallpapers WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn insert_comment(
        &self,
        wallpaper_id: i64,
        user_id: i64,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (wallpaper_id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![wallpaper_id, user_id, text, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_comments(&self, wallpaper_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the author name in a single query
            let mut stmt = conn.prepare(
                "SELECT c.id, c.wallpaper_id, c.user_id, u.username, c.text, c.created_at
                 FROM comments c
                 JOIN users u ON c.user_id = u.id
                 WHERE c.wallpaper_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([wallpaper_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        wallpaper_id: row.get(1)?,
                        user_id: row.get(2)?,
                        username: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        surname: row.get(4)?,
        password_hash: row.get(5)?,
        is_admin: row.get(6)?,
    })
}

fn query_wallpapers(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<WallpaperRow>> {
    let sql = format!(
        "SELECT {WALLPAPER_COLUMNS} FROM wallpapers {filter} ORDER BY uploaded_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(WallpaperRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                filename: row.get(2)?,
                original_name: row.get(3)?,
                uploaded_at: row.get(4)?,
                is_public: row.get(5)?,
                to_review: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_users() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "a@x.com", "A", "B", "hash").unwrap();
        let bob = db.create_user("bob", "b@x.com", "", "", "hash").unwrap();
        (db, alice, bob)
    }

    #[test]
    fn test_duplicate_username_and_email_rejected() {
        let (db, _, _) = db_with_users();
        assert!(db.create_user("alice", "other@x.com", "", "", "h").is_err());
        assert!(db.create_user("carol", "a@x.com", "", "", "h").is_err());
    }

    #[test]
    fn test_owner_filter_guards_rename() {
        let (db, alice, bob) = db_with_users();
        let id = db.insert_wallpaper(alice, "1_a.png", "a.png", Utc::now()).unwrap();

        assert_eq!(db.rename_wallpaper(id, Some(bob), "stolen").unwrap(), 0);
        assert_eq!(db.rename_wallpaper(id, Some(alice), "mine").unwrap(), 1);
        assert_eq!(db.rename_wallpaper(id, None, "any").unwrap(), 1);
        assert_eq!(db.rename_wallpaper(id + 100, None, "gone").unwrap(), 0);

        let rows = db.list_wallpapers_by_owner(alice).unwrap();
        assert_eq!(rows[0].original_name, "any");
    }

    #[test]
    fn test_delete_wallpaper_returns_filename() {
        let (db, alice, bob) = db_with_users();
        let id = db.insert_wallpaper(alice, "1_a.png", "a.png", Utc::now()).unwrap();

        assert_eq!(db.delete_wallpaper(id, Some(bob)).unwrap(), None);
        assert_eq!(db.delete_wallpaper(id, Some(alice)).unwrap().as_deref(), Some("1_a.png"));
        assert_eq!(db.delete_wallpaper(id, Some(alice)).unwrap(), None);
    }

    #[test]
    fn test_visibility_transitions() {
        let (db, alice, _) = db_with_users();
        let id = db.insert_wallpaper(alice, "1_a.png", "a.png", Utc::now()).unwrap();

        db.request_review(id, Some(alice)).unwrap();
        assert_eq!(db.list_wallpapers_to_review().unwrap().len(), 1);

        // deny twice: the second is a matched no-op
        assert_eq!(db.deny_wallpaper(id, None).unwrap(), 1);
        assert_eq!(db.deny_wallpaper(id, None).unwrap(), 1);
        assert!(db.list_wallpapers_to_review().unwrap().is_empty());

        db.request_review(id, Some(alice)).unwrap();
        db.publish_wallpaper(id, None).unwrap();
        let public = db.list_public_wallpapers().unwrap();
        assert_eq!(public.len(), 1);
        assert!(!public[0].to_review);
    }

    #[test]
    fn test_set_admin_counts_matched_rows() {
        let (db, _, _) = db_with_users();
        assert_eq!(db.set_admin_by_username("bob", false).unwrap(), 1);
        assert_eq!(db.set_admin_by_username("nobody", true).unwrap(), 0);
        assert_eq!(db.set_admin_by_username("bob", true).unwrap(), 1);
        assert!(db.get_user_by_username("bob").unwrap().unwrap().is_admin);
    }

    #[test]
    fn test_delete_user_cascades() {
        let (db, alice, bob) = db_with_users();
        let wp = db.insert_wallpaper(alice, "1_a.png", "a.png", Utc::now()).unwrap();
        db.insert_wallpaper(alice, "1_b.png", "b.png", Utc::now()).unwrap();
        db.insert_comment(wp, bob, "nice", Utc::now()).unwrap();
        db.create_session("tok", alice, Utc::now() + Duration::hours(1)).unwrap();

        let mut files = db.delete_user(alice).unwrap().unwrap();
        files.sort();
        assert_eq!(files, vec!["1_a.png", "1_b.png"]);

        assert!(db.get_session("tok").unwrap().is_none());
        assert!(db.list_wallpapers_by_owner(alice).unwrap().is_empty());
        assert!(db.list_comments(wp).unwrap().is_empty());
        assert!(db.delete_user(alice).unwrap().is_none());
    }

    #[test]
    fn test_insert_wallpaper_requires_existing_owner() {
        let (db, _, _) = db_with_users();
        assert!(db.insert_wallpaper(999, "999_x.png", "x.png", Utc::now()).is_err());
    }

    #[test]
    fn test_delete_expired_sessions() {
        let (db, alice, _) = db_with_users();
        let now = Utc::now();
        db.create_session("old", alice, now - Duration::hours(1)).unwrap();
        db.create_session("new", alice, now + Duration::hours(1)).unwrap();

        assert_eq!(db.delete_expired_sessions(now).unwrap(), 1);
        assert!(db.get_session("old").unwrap().is_none());
        assert_eq!(db.get_session("new").unwrap().unwrap().user_id, alice);
    }

    #[test]
    fn test_list_orders_newest_first() {
        let (db, alice, _) = db_with_users();
        let now = Utc::now();
        db.insert_wallpaper(alice, "1_old.png", "old.png", now - Duration::minutes(5)).unwrap();
        db.insert_wallpaper(alice, "1_new.png", "new.png", now).unwrap();

        let names: Vec<_> = db
            .list_wallpapers_by_owner(alice)
            .unwrap()
            .into_iter()
            .map(|w| w.original_name)
            .collect();
        assert_eq!(names, vec!["new.png", "old.png"]);
    }
}
