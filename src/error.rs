use thiserror::Error;

/// The crate-wide error type.
///
/// Leaf error kinds (`SlugTaken`, `OwnerCannotLeave`, ...) are not separate
/// enum variants — they're encoded as a canonical-phrase substring inside
/// one of the category variants below, so callers (and tests) match on
/// `err.to_string().contains("SlugTaken")` instead of a combinatorial
/// variant list per named error.
#[derive(Error, Debug)]
pub enum SignHubError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, SignHubError>;

impl SignHubError {
    pub fn validation(phrase: &str, detail: impl std::fmt::Display) -> Self {
        Self::Validation(format!("{phrase}: {detail}"))
    }

    pub fn not_found(phrase: &str) -> Self {
        Self::NotFound(phrase.to_string())
    }

    pub fn conflict(phrase: &str) -> Self {
        Self::Conflict(phrase.to_string())
    }

    pub fn not_permitted(phrase: &str) -> Self {
        Self::NotPermitted(phrase.to_string())
    }

    pub fn invalid_state(phrase: &str) -> Self {
        Self::InvalidState(phrase.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let cases: Vec<(SignHubError, &str)> = vec![
            (SignHubError::validation("FullNameEmpty", "full_name"), "FullNameEmpty"),
            (SignHubError::not_found("CompanyNotFound"), "CompanyNotFound"),
            (SignHubError::conflict("SlugTaken"), "SlugTaken"),
            (SignHubError::not_permitted("OwnerCannotLeave"), "OwnerCannotLeave"),
            (SignHubError::invalid_state("BlockedConnection"), "BlockedConnection"),
        ];
        for (err, expected) in cases {
            assert!(err.to_string().contains(expected), "{err} should contain {expected}");
        }
    }

    #[test]
    fn error_from_rusqlite() {
        let err = rusqlite::Connection::open_in_memory()
            .and_then(|c| c.execute("INVALID SQL", []))
            .unwrap_err();
        let wrapped: SignHubError = err.into();
        assert!(wrapped.to_string().contains("database error"));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SignHubError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn result_type_alias_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.unwrap(), 42);
        let err: Result<i32> = Err(SignHubError::not_permitted("NotPermitted"));
        assert!(err.is_err());
    }
}
