//! Retry policy for SQLite operations
//!
//! SQLite reports lock contention and file-level hiccups (WAL checkpoints,
//! synced directories) as distinct result codes. Those are worth retrying;
//! everything else (constraint violations, a closed pool, schema errors)
//! is returned to the caller straight away.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Check if a SQLite error is transient and should be retried
///
/// This includes:
/// - SQLITE_BUSY (5): Database locked by another connection
/// - SQLITE_LOCKED (6): Database table is locked
/// - SQLITE_IOERR (10): Base I/O error
/// - SQLITE_IOERR_READ (266): I/O error during read (10 | 1<<8)
/// - SQLITE_IOERR_SHORT_READ (522): Read returned fewer bytes than expected (10 | 2<<8)
/// - SQLITE_BUSY_SNAPSHOT (1032): Busy due to WAL snapshot (5 | 4<<8)
/// - SQLITE_IOERR_WRITE (2314): I/O error during write (10 | 9<<8)
/// - SQLITE_IOERR_FSYNC (3338): I/O error during fsync (10 | 13<<8)
/// - SQLITE_IOERR_LOCK (5386): I/O error getting file lock (10 | 21<<8)
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            matches!(
                code.as_deref(),
                Some("5")     // SQLITE_BUSY
                | Some("6")   // SQLITE_LOCKED
                | Some("10")  // SQLITE_IOERR
                | Some("266") // SQLITE_IOERR_READ
                | Some("522") // SQLITE_IOERR_SHORT_READ
                | Some("1032") // SQLITE_BUSY_SNAPSHOT
                | Some("2314") // SQLITE_IOERR_WRITE
                | Some("3338") // SQLITE_IOERR_FSYNC
                | Some("5386") // SQLITE_IOERR_LOCK
            )
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 5 attempts, 200ms doubling: 200ms, 400ms, 800ms, 1600ms
pub fn storage_policy() -> RetryPolicy<sqlx::Error> {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_millis(1600),
        multiplier: 2,
        retryable: is_transient_error,
    }
}
