//! Self-hosted gateway backed by SQLite.
//!
//! # Responsibility
//! - Serve project records from the `projects` table.
//! - Serve image blobs from the `buckets`/`blobs` tables.
//!
//! # Invariants
//! - Record ids come from `AUTOINCREMENT` and are never reused.
//! - `select_all` returns records in id (insertion) order; updates keep ids.
//! - Only canonical decimal ids address a row.
//! - Tags are persisted as a JSON array to keep their display order.
//! - Read paths reject invalid persisted state instead of masking it.

use super::{
    blob_name_under_prefix, BlobUpload, GatewayError, GatewayResult, ProjectGateway,
    PROJECTS_TABLE,
};
use crate::db::{open_db, open_db_in_memory};
use crate::model::project::{Project, ProjectFields, ProjectId};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    image,
    tags,
    live_url,
    github_url,
    featured
FROM projects";

/// SQLite-backed record and blob gateway.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
    public_base_url: String,
}

impl SqliteGateway {
    /// Wraps a migrated connection.
    ///
    /// `public_base_url` is the prefix under which blobs are served, e.g.
    /// `http://localhost:8080/media`; URLs are `<base>/<bucket>/<path>`.
    pub fn new(conn: Connection, public_base_url: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>, public_base_url: impl Into<String>) -> GatewayResult<Self> {
        Ok(Self::new(open_db(path)?, public_base_url))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(public_base_url: impl Into<String>) -> GatewayResult<Self> {
        Ok(Self::new(open_db_in_memory()?, public_base_url))
    }

    /// Creates a storage bucket if missing.
    pub fn create_bucket(&self, bucket: &str) -> GatewayResult<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO buckets (name) VALUES (?1);",
            [bucket],
        )?;
        Ok(())
    }

    /// Returns stored blob bytes, if present.
    pub fn read_blob(&self, bucket: &str, name: &str) -> GatewayResult<Option<Vec<u8>>> {
        let bytes = self
            .conn()?
            .query_row(
                "SELECT bytes FROM blobs WHERE bucket = ?1 AND name = ?2;",
                [bucket, name],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(bytes)
    }

    fn conn(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GatewayError::Transport("sqlite connection lock poisoned".to_string()))
    }
}

impl ProjectGateway for SqliteGateway {
    fn insert_record(&self, table: &str, fields: &ProjectFields) -> GatewayResult<Project> {
        ensure_projects_table(table)?;
        let tags = encode_tags(&fields.tags)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO projects (
                title,
                description,
                image,
                tags,
                live_url,
                github_url,
                featured
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                fields.title.as_str(),
                fields.description.as_str(),
                fields.image.as_str(),
                tags,
                fields.live_url.as_deref(),
                fields.github_url.as_deref(),
                bool_to_int(fields.featured),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("event=record_insert module=gateway status=ok backend=sqlite id={id}");
        Ok(fields.clone().with_id(ProjectId::from(id)))
    }

    fn select_all(&self, table: &str) -> GatewayResult<Vec<Project>> {
        ensure_projects_table(table)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn update_record(
        &self,
        table: &str,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> GatewayResult<Option<Project>> {
        ensure_projects_table(table)?;
        let Some(row_id) = parse_row_id(id) else {
            return Ok(None);
        };
        let tags = encode_tags(&fields.tags)?;
        let changed = self.conn()?.execute(
            "UPDATE projects
             SET
                title = ?1,
                description = ?2,
                image = ?3,
                tags = ?4,
                live_url = ?5,
                github_url = ?6,
                featured = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?8;",
            params![
                fields.title.as_str(),
                fields.description.as_str(),
                fields.image.as_str(),
                tags,
                fields.live_url.as_deref(),
                fields.github_url.as_deref(),
                bool_to_int(fields.featured),
                row_id,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(fields.clone().with_id(id.clone())))
    }

    fn delete_record(&self, table: &str, id: &ProjectId) -> GatewayResult<Option<Project>> {
        ensure_projects_table(table)?;
        let Some(row_id) = parse_row_id(id) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "DELETE FROM projects
             WHERE id = ?1
             RETURNING
                id,
                title,
                description,
                image,
                tags,
                live_url,
                github_url,
                featured;",
        )?;
        let mut rows = stmt.query([row_id])?;
        let deleted = match rows.next()? {
            Some(row) => Some(parse_project_row(row)?),
            None => None,
        };
        debug!(
            "event=record_delete module=gateway status=ok backend=sqlite id={id} found={}",
            deleted.is_some()
        );
        Ok(deleted)
    }

    fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        let exists: i64 = self.conn()?.query_row(
            "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1);",
            [bucket],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn upload_blob(
        &self,
        bucket: &str,
        name: &str,
        blob: BlobUpload<'_>,
    ) -> GatewayResult<String> {
        if !self.bucket_exists(bucket)? {
            return Err(GatewayError::MissingBucket(bucket.to_string()));
        }

        let inserted = self.conn()?.execute(
            "INSERT INTO blobs (bucket, name, content_type, bytes) VALUES (?1, ?2, ?3, ?4);",
            params![bucket, name, blob.content_type, blob.bytes],
        );
        match inserted {
            Ok(_) => Ok(name.to_string()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(GatewayError::BlobExists {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{bucket}/{path}", self.public_base_url)
    }

    fn remove_blob(&self, bucket: &str, name: &str) -> GatewayResult<()> {
        self.conn()?.execute(
            "DELETE FROM blobs WHERE bucket = ?1 AND name = ?2;",
            [bucket, name],
        )?;
        Ok(())
    }

    fn blob_name_for_url(&self, bucket: &str, url: &str) -> Option<String> {
        blob_name_under_prefix(&format!("{}/{bucket}", self.public_base_url), url)
    }
}

fn ensure_projects_table(table: &str) -> GatewayResult<()> {
    if table == PROJECTS_TABLE {
        Ok(())
    } else {
        Err(GatewayError::UnknownTable(table.to_string()))
    }
}

/// Maps an id to its row id. Only the canonical decimal form matches, so
/// `"01"`, `"+1"` or `" 1"` never alias row 1.
fn parse_row_id(id: &ProjectId) -> Option<i64> {
    id.as_str()
        .parse::<i64>()
        .ok()
        .filter(|row_id| row_id.to_string() == id.as_str())
}

fn parse_project_row(row: &Row<'_>) -> GatewayResult<Project> {
    let id: i64 = row.get("id")?;
    let tags_text: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_text).map_err(|err| {
        GatewayError::InvalidData(format!("invalid tags value in projects.tags for id {id}: {err}"))
    })?;

    let featured = match row.get::<_, i64>("featured")? {
        0 => false,
        1 => true,
        other => {
            return Err(GatewayError::InvalidData(format!(
                "invalid featured value `{other}` in projects.featured"
            )));
        }
    };

    let fields = ProjectFields {
        title: row.get("title")?,
        description: row.get("description")?,
        image: row.get("image")?,
        tags,
        live_url: row.get("live_url")?,
        github_url: row.get("github_url")?,
        featured,
    };
    fields
        .validate()
        .map_err(|err| GatewayError::InvalidData(format!("project {id}: {err}")))?;
    Ok(fields.with_id(ProjectId::from(id)))
}

fn encode_tags(tags: &[String]) -> GatewayResult<String> {
    serde_json::to_string(tags)
        .map_err(|err| GatewayError::InvalidData(format!("failed to encode tags: {err}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
