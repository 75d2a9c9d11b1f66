use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::{InsightError, Result};
use crate::validation::InputValidator;

/// Read-only handle on a Messages `chat.db`
///
/// Holds only the path. Every query opens its own connection through
/// [`MessageStore::open`] and drops it once rows are materialized, so the
/// store is never held open between calls.
#[derive(Debug, Clone)]
pub struct MessageStore {
    path: PathBuf,
}

impl MessageStore {
    /// Point at a store; nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh read-only connection.
    ///
    /// A missing file or a failed open (usually a permission denial) is
    /// reported as [`InsightError::StoreUnavailable`].
    pub fn open(&self) -> Result<Connection> {
        if let Err(e) = InputValidator::validate_store_path(&self.path) {
            warn!(path = %self.path.display(), "Message store not found");
            return Err(e);
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(&self.path, flags).map_err(|e| self.unavailable(&e))?;

        // Opening is lazy; reading the header is what rejects a non-database file.
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(|e| self.unavailable(&e))?;

        debug!(path = %self.path.display(), "Opened read-only store connection");
        Ok(conn)
    }

    fn unavailable(&self, error: &rusqlite::Error) -> InsightError {
        warn!(path = %self.path.display(), %error, "Failed to open message store");
        InsightError::StoreUnavailable(format!("{}: {error}", self.path.display()))
    }

    /// Verify the store can be opened and looks like a Messages database.
    pub fn check(&self) -> Result<()> {
        let conn = self.open()?;
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name IN ('message', 'handle')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| InsightError::StoreUnavailable(e.to_string()))?;
        if tables < 2 {
            return Err(InsightError::StoreUnavailable(format!(
                "{} is not a Messages database",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Whether a query error means the store itself is unusable rather than one
/// statement failing.
pub(crate) fn is_store_error(error: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode;

    matches!(
        error.sqlite_error_code(),
        Some(
            ErrorCode::NotADatabase
                | ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied
        )
    )
}
