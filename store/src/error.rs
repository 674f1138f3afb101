//! Error types of the index store.

use rusqlite::ErrorCode;
use snafu::{Backtrace, IntoError, Snafu};
use std::path::PathBuf;

/// An error which occurred while accessing the index store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not create directory {}", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not open index database {}", path.display()))]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
        backtrace: Backtrace,
    },

    /// The database is locked by another connection.
    /// The operation may succeed if tried again later.
    #[snafu(display("Index store is busy"))]
    Busy {
        source: rusqlite::Error,
        backtrace: Backtrace,
    },

    /// The database could not be used.
    /// Further writes are expected to fail as well.
    #[snafu(display("Index store unavailable"))]
    StoreUnavailable {
        source: rusqlite::Error,
        backtrace: Backtrace,
    },

    /// Another thread panicked while holding the writer connection
    WriterPoisoned { backtrace: Backtrace },
}

impl Error {
    /// Whether the failed operation may be tried again,
    /// as opposed to a fatal store failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy { .. })
    }
}

/// Result type for index store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Extension for classifying SQLite errors
/// into retryable and fatal store errors.
pub(crate) trait SqlResultExt<T> {
    fn store_context(self) -> Result<T>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn store_context(self) -> Result<T> {
        self.map_err(|source| match source.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                BusySnafu.into_error(source)
            }
            _ => StoreUnavailableSnafu.into_error(source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn busy_is_retryable() {
        let err = Err::<(), _>(sqlite_failure(rusqlite::ffi::SQLITE_BUSY))
            .store_context()
            .unwrap_err();
        assert!(err.is_retryable());
        let err = Err::<(), _>(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED))
            .store_context()
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn other_failures_are_fatal() {
        let err = Err::<(), _>(sqlite_failure(rusqlite::ffi::SQLITE_CORRUPT))
            .store_context()
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }
}
