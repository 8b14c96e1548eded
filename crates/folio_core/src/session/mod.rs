//! Admin session gate.
//!
//! # Responsibility
//! - Persist the admin-session flag in a local key/value store.
//! - Verify admin credentials against a salted hash before opening a session.
//!
//! # Invariants
//! - The flag lives under the fixed key `isAdmin`.
//! - Sessions expire; an expired session reads as logged out.
//! - Plain-text passwords are never stored or logged.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod credential;
pub mod gate;
pub mod kv_store;

pub use credential::CredentialVerifier;
pub use gate::{SessionGate, ADMIN_SESSION_KEY};
pub use kv_store::{KeyValueStore, SqliteKeyValueStore};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub enum SessionError {
    Db(DbError),
    /// Credential material in configuration is malformed.
    InvalidCredential(String),
    /// Stored session value could not be encoded.
    Encoding(String),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidCredential(message) => write!(f, "invalid admin credential: {message}"),
            Self::Encoding(message) => write!(f, "session encoding error: {message}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
