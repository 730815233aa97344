// Database manager for argraph
// Handles the SQLite connection and provides access to repositories

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;

use super::migrations;

/// Database manager that owns the SQLite connection.
///
/// One instance is constructed at process start and injected into every
/// component that needs persistence (reconciler, tree reads, request
/// handlers). Tests construct an isolated in-memory instance instead.
pub struct DatabaseManager {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DatabaseManager {
    /// Create a new DatabaseManager with the database at the specified path
    pub fn new(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create database directory")?;
        }

        let conn = Connection::open(&db_path)
            .context("Failed to open database")?;
        Self::init(conn, Some(db_path))
    }

    /// Create a DatabaseManager backed by an in-memory database.
    /// Used by tests; state lives only as long as the instance.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;

        // Run migrations
        migrations::run_migrations(&conn)
            .context("Failed to run database migrations")?;

        match &db_path {
            Some(p) => log::info!("Database initialized at: {:?}", p),
            None => log::info!("In-memory database initialized"),
        }

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Execute a function with access to the database connection.
    ///
    /// The mutex scopes every read and write, so readers observe either the
    /// pre- or post-state of a concurrent write, never a partial one.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock database connection: {}", e))?;
        f(&conn)
    }

    /// Get the database path (None for in-memory databases)
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let manager = DatabaseManager::new(db_path.clone()).unwrap();
        assert!(db_path.exists());

        // Test that we can access the connection
        manager.with_connection(|conn| {
            let count: i32 = conn.query_row(
                "SELECT COUNT(*) FROM transcripts",
                [],
                |row| row.get(0),
            )?;
            assert_eq!(count, 0);
            Ok(())
        }).unwrap();
    }

    #[test]
    fn test_in_memory_database() {
        let manager = DatabaseManager::new_in_memory().unwrap();
        assert!(manager.db_path().is_none());

        manager.with_connection(|conn| {
            let count: i32 = conn.query_row(
                "SELECT COUNT(*) FROM claims",
                [],
                |row| row.get(0),
            )?;
            assert_eq!(count, 0);
            Ok(())
        }).unwrap();
    }
}
