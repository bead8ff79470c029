//! The mongodb crate doesn't name its server error codes, so the ones we
//! react to live here.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Did this write fail because it would have violated a unique index?
///
/// Used to detect username collisions on registration and join code
/// collisions on event creation.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}
