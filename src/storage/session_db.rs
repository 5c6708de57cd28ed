use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use super::database::Database;
use super::models::StoredSession;

/// Database for the persisted login token
pub struct SessionDatabase {
    db: Database,
}

impl SessionDatabase {
    /// Initialize session database inside the data directory
    pub fn open_in(data_dir: &Path) -> SqlResult<Self> {
        Self::with_path(data_dir.join("client.db"))
    }

    /// Initialize session database at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let db = Database::open(path)?;
        Self::init(db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        Self::init(Database::in_memory()?)
    }

    fn init(db: Database) -> SqlResult<Self> {
        if let Some(path) = db.path() {
            log::info!("Session store at {}", path.display());
        }
        let session_db = Self { db };
        session_db.init_schema()?;
        Ok(session_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        let conn = self.db.connection();

        // Session table (single row)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                token TEXT NOT NULL,
                user_id TEXT,
                saved_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Save the session (replace if exists)
    pub fn save(&self, token: &str, user_id: Option<&str>) -> SqlResult<()> {
        let conn = self.db.connection();
        conn.execute(
            "INSERT OR REPLACE INTO session (id, token, user_id, saved_at)
             VALUES (1, ?1, ?2, ?3)",
            params![token, user_id, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn load(&self) -> SqlResult<Option<StoredSession>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare("SELECT token, user_id, saved_at FROM session WHERE id = 1")?;

        let session = stmt
            .query_row([], |row| {
                Ok(StoredSession {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    saved_at: row.get(2)?,
                })
            })
            .optional()?;

        Ok(session)
    }

    /// Remove the stored token; returns whether one existed
    pub fn clear(&self) -> SqlResult<bool> {
        let conn = self.db.connection();
        let removed = conn.execute("DELETE FROM session WHERE id = 1", [])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let db = SessionDatabase::in_memory().unwrap();
        assert!(db.load().unwrap().is_none());

        db.save("tok-1", Some("alice")).unwrap();
        db.save("tok-2", Some("alice")).unwrap();
        let stored = db.load().unwrap().unwrap();
        assert_eq!(stored.token, "tok-2");
        assert_eq!(stored.user_id.as_deref(), Some("alice"));

        assert!(db.clear().unwrap());
        assert!(db.load().unwrap().is_none());
        assert!(!db.clear().unwrap());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        SessionDatabase::open_in(dir.path())
            .unwrap()
            .save("tok", None)
            .unwrap();

        let reopened = SessionDatabase::open_in(dir.path()).unwrap();
        let stored = reopened.load().unwrap().unwrap();
        assert_eq!(stored.token, "tok");
        assert_eq!(stored.user_id, None);
    }
}
