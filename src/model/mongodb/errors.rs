//! The mongodb crate doesn't provide server error code constants, so the
//! ones the vote ledger cares about live here.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key violation, whether it
/// was reported as a write error or as a command error (as happens inside
/// transactions on some server versions).
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{
        bson::{doc, from_document},
        error::{CommandError, WriteError},
    };

    use super::*;

    fn write_error(code: i32) -> DbError {
        let e: WriteError = from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: votes",
        })
        .unwrap();
        DbError::from(ErrorKind::Write(WriteFailure::WriteError(e)))
    }

    fn command_error(code: i32) -> DbError {
        let e: CommandError = from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: votes",
        })
        .unwrap();
        DbError::from(ErrorKind::Command(e))
    }

    #[test]
    fn duplicate_key_write_error() {
        assert!(is_duplicate_key_error(&write_error(DUPLICATE_KEY)));
    }

    #[test]
    fn duplicate_key_command_error() {
        // Inside a transaction the violation comes back as a command error.
        assert!(is_duplicate_key_error(&command_error(DUPLICATE_KEY)));
    }

    #[test]
    fn other_codes_are_not_duplicates() {
        // 112 is WriteConflict.
        assert!(!is_duplicate_key_error(&write_error(112)));
        assert!(!is_duplicate_key_error(&command_error(112)));
        assert!(!is_duplicate_key_error(&DbError::from(
            ErrorKind::InvalidArgument {
                message: "not a server error".to_string(),
            }
        )));
    }
}
