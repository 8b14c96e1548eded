//! Remote persistence gateway contracts.
//!
//! # Responsibility
//! - Define the record/blob contract the project store consumes.
//! - Provide a self-hosted SQLite gateway and a Supabase-compatible HTTP one.
//!
//! # Invariants
//! - Gateways assign record ids; callers never supply them.
//! - Not-found is a value (`None`), not an error.
//! - Gateway errors are infrastructure failures only.

use crate::db::DbError;
use crate::model::project::{Project, ProjectFields, ProjectId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod http_gateway;
pub mod sqlite_gateway;

pub use http_gateway::{HttpGateway, HttpGatewayConfig};
pub use sqlite_gateway::SqliteGateway;

/// Default record table for projects.
pub const PROJECTS_TABLE: &str = "projects";
/// Default storage bucket for project images.
pub const PROJECTS_BUCKET: &str = "projects";

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Infrastructure failure while talking to a gateway.
#[derive(Debug)]
pub enum GatewayError {
    /// Local storage backend failure.
    Db(DbError),
    /// Transport-level failure (connect, timeout, body read).
    Transport(String),
    /// Gateway answered with a non-success status.
    Rejected { status: u16, message: String },
    /// Gateway payload could not be interpreted.
    InvalidData(String),
    /// Table is not served by this gateway.
    UnknownTable(String),
    /// Storage bucket does not exist.
    MissingBucket(String),
    /// Blob name is already taken in the bucket.
    BlobExists { bucket: String, name: String },
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Transport(message) => write!(f, "gateway transport error: {message}"),
            Self::Rejected { status, message } => {
                write!(f, "gateway rejected request with status {status}: {message}")
            }
            Self::InvalidData(message) => write!(f, "invalid gateway data: {message}"),
            Self::UnknownTable(table) => write!(f, "unknown table: {table}"),
            Self::MissingBucket(bucket) => write!(f, "storage bucket not found: {bucket}"),
            Self::BlobExists { bucket, name } => {
                write!(f, "blob already exists: {bucket}/{name}")
            }
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Binary payload for blob uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUpload<'a> {
    pub bytes: &'a [u8],
    pub content_type: Option<&'a str>,
}

/// Record and blob operations consumed by the project store.
///
/// Implementations must be shareable across threads; the store performs no
/// coordination of concurrent calls.
pub trait ProjectGateway: Send + Sync {
    /// Inserts a record and returns it with the assigned id.
    fn insert_record(&self, table: &str, fields: &ProjectFields) -> GatewayResult<Project>;
    /// Returns all records in gateway order.
    fn select_all(&self, table: &str) -> GatewayResult<Vec<Project>>;
    /// Replaces all fields of a record; `None` when the id is unknown.
    fn update_record(
        &self,
        table: &str,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> GatewayResult<Option<Project>>;
    /// Deletes a record and returns it as it was; `None` when the id is unknown.
    fn delete_record(&self, table: &str, id: &ProjectId) -> GatewayResult<Option<Project>>;

    fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool>;
    /// Stores a blob and returns its path inside the bucket.
    fn upload_blob(&self, bucket: &str, name: &str, blob: BlobUpload<'_>)
        -> GatewayResult<String>;
    /// Builds the public URL for a stored path. Never touches the network.
    fn public_url(&self, bucket: &str, path: &str) -> String;
    fn remove_blob(&self, bucket: &str, name: &str) -> GatewayResult<()>;
    /// Returns the blob name when `url` is a public URL served from `bucket`.
    fn blob_name_for_url(&self, bucket: &str, url: &str) -> Option<String>;
}

/// Extracts the blob name when `url` starts with `<public_prefix>/`.
///
/// Query strings and fragments are ignored; nested paths are rejected since
/// uploads are always stored at the bucket root.
pub(crate) fn blob_name_under_prefix(public_prefix: &str, url: &str) -> Option<String> {
    let prefix = format!("{}/", public_prefix.trim_end_matches('/'));
    let rest = url.strip_prefix(prefix.as_str())?;
    let name = rest.split(['?', '#']).next().unwrap_or_default();
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name.to_string())
}
