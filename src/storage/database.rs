use rusqlite::{Connection, Result as SqlResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SQLite connection plus where it lives (`None` for in-memory).
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        // A second client instance may hold the file briefly.
        conn.busy_timeout(Duration::from_secs(2))?;
        log::debug!("Opened session database at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> SqlResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
