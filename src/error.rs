//! Errors surfaced by the persistence and identity layers

use thiserror::Error;

use crate::models::UnknownValue;

/// Failures at the store boundary. Query and statistics code never fails.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or a value is out of range
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The database could not be reached or returned an error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Update/delete target or share token does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sign-in/sign-up failure, message is shown to the user as-is
    #[error("{0}")]
    Auth(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for StoreError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Connection(format!("password hashing failed: {err}"))
    }
}

impl From<UnknownValue> for StoreError {
    fn from(err: UnknownValue) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
