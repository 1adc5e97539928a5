//! Database connection management.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const DB_FILE: &str = "kiosk.db";
const APP_DIR: &str = "kiosk";

/// Shared handle to the local SQLite database.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Get the default database path based on the KIOSK_HOME environment variable or platform defaults.
    ///
    /// Priority order:
    /// 1. KIOSK_HOME environment variable (custom)
    /// 2. Platform-specific defaults:
    ///    - Linux: `${XDG_STATE_HOME:-~/.local/state}/kiosk/kiosk.db`
    ///    - macOS: `~/Library/Application Support/kiosk/kiosk.db`
    ///    - Windows: `%LOCALAPPDATA%\kiosk\kiosk.db`
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Ok(home) = std::env::var("KIOSK_HOME") {
            return Ok(PathBuf::from(home).join(DB_FILE));
        }

        #[cfg(target_os = "linux")]
        {
            let state_home = match std::env::var("XDG_STATE_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => home_dir()?.join(".local").join("state"),
            };
            Ok(state_home.join(APP_DIR).join(DB_FILE))
        }

        #[cfg(target_os = "macos")]
        {
            Ok(home_dir()?
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join(DB_FILE))
        }

        #[cfg(target_os = "windows")]
        {
            let local_appdata = std::env::var("LOCALAPPDATA")
                .map_err(|_| crate::Error::generic("LOCALAPPDATA environment variable not set"))?;
            Ok(PathBuf::from(local_appdata).join(APP_DIR).join(DB_FILE))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(home_dir()?.join(".kiosk").join(DB_FILE))
        }
    }

    /// Open the database at the default path, creating parent directories.
    pub fn open_default() -> crate::Result<Self> {
        let path = Self::default_path()?;
        Self::open(&path)
    }

    /// Open a database at the specified path.
    ///
    /// Missing parent directories and the database file are created.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> crate::Result<()> {
        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        crate::migrations::MigrationManager::migrate(conn)?;
        Ok(())
    }

    /// Lock the underlying connection.
    pub fn connection(&self) -> crate::Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| crate::Error::generic(format!("Failed to acquire database lock: {}", e)))
    }

    /// Execute a transaction with automatic rollback on error.
    pub fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.connection()?;

        let tx = conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> crate::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| crate::Error::generic("HOME environment variable not set"))
}
