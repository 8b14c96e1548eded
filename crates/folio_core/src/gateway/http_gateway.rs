//! Supabase-compatible gateway over blocking HTTP.
//!
//! # Responsibility
//! - Map record CRUD onto PostgREST endpoints under `/rest/v1/<table>`.
//! - Map blob storage onto `/storage/v1/bucket` and `/storage/v1/object`.
//!
//! # Invariants
//! - Every request carries the `apikey` and bearer authorization headers.
//! - Mutations ask for `return=representation` so ids come from the server.
//! - An empty representation on update/delete means the id was not found,
//!   as does an id the server cannot cast to its key type.
//! - The gateway adds no timeout beyond the configured client timeout.

use super::{
    blob_name_under_prefix, BlobUpload, GatewayError, GatewayResult, ProjectGateway,
};
use crate::model::project::{Project, ProjectFields, ProjectId};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Connection settings for a Supabase-compatible backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGatewayConfig {
    /// Project URL, e.g. `https://<ref>.supabase.co`.
    pub base_url: String,
    /// Anonymous or service API key.
    pub api_key: String,
    pub timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Record/blob gateway speaking the Supabase REST and storage APIs.
pub struct HttpGateway {
    client: Client,
    config: HttpGatewayConfig,
}

/// Column layout of the remote `projects` table.
#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    #[serde(default, skip_serializing)]
    id: Option<ProjectId>,
    title: String,
    description: String,
    image: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    live_url: Option<String>,
    #[serde(default)]
    github_url: Option<String>,
    #[serde(default)]
    featured: bool,
}

impl From<&ProjectFields> for ProjectRow {
    fn from(fields: &ProjectFields) -> Self {
        Self {
            id: None,
            title: fields.title.clone(),
            description: fields.description.clone(),
            image: fields.image.clone(),
            tags: fields.tags.clone(),
            live_url: fields.live_url.clone(),
            github_url: fields.github_url.clone(),
            featured: fields.featured,
        }
    }
}

impl ProjectRow {
    fn into_project(self) -> GatewayResult<Project> {
        let id = self
            .id
            .ok_or_else(|| GatewayError::InvalidData("record is missing `id`".to_string()))?;
        Ok(ProjectFields {
            title: self.title,
            description: self.description,
            image: self.image,
            tags: self.tags,
            live_url: self.live_url,
            github_url: self.github_url,
            featured: self.featured,
        }
        .with_id(id))
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    prefixes: [&'a str; 1],
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GatewayError::Transport(format!("http client: {err}")))?;
        Ok(Self { client, config })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url)
    }

    fn storage_url(&self, suffix: &str) -> String {
        format!("{}/storage/v1/{suffix}", self.config.base_url)
    }

    fn public_prefix(&self, bucket: &str) -> String {
        self.storage_url(&format!("object/public/{bucket}"))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", self.config.api_key.as_str())
            .bearer_auth(self.config.api_key.as_str())
    }

    fn send(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        self.authorized(builder)
            .send()
            .map_err(|err| GatewayError::Transport(err.to_string()))
    }

    /// Reads rows matched by an id filter.
    ///
    /// PostgREST answers 400 with SQLSTATE `22P02` when the id cannot be cast
    /// to the column type; no row can match such an id.
    fn read_rows_by_id(&self, id: &ProjectId, response: Response) -> GatewayResult<Vec<Project>> {
        if response.status() != StatusCode::BAD_REQUEST {
            return self.read_rows(response);
        }
        let body = response.text().unwrap_or_default();
        if is_invalid_text_representation(&body) {
            debug!("event=record_lookup module=gateway status=not_found backend=http id={id} reason=invalid_id");
            return Ok(Vec::new());
        }
        Err(rejected(StatusCode::BAD_REQUEST, &body))
    }

    fn read_rows(&self, response: Response) -> GatewayResult<Vec<Project>> {
        let response = ensure_success(response)?;
        let rows: Vec<ProjectRow> = response
            .json()
            .map_err(|err| GatewayError::InvalidData(format!("record payload: {err}")))?;
        rows.into_iter().map(ProjectRow::into_project).collect()
    }
}

impl ProjectGateway for HttpGateway {
    fn insert_record(&self, table: &str, fields: &ProjectFields) -> GatewayResult<Project> {
        let response = self.send(
            self.client
                .post(self.rest_url(table))
                .header("Prefer", "return=representation")
                .json(&[ProjectRow::from(fields)]),
        )?;
        let project = self
            .read_rows(response)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::InvalidData("insert returned no record".to_string()))?;
        debug!(
            "event=record_insert module=gateway status=ok backend=http id={}",
            project.id
        );
        Ok(project)
    }

    fn select_all(&self, table: &str) -> GatewayResult<Vec<Project>> {
        let response = self.send(
            self.client
                .get(self.rest_url(table))
                .query(&[("select", "*"), ("order", "id.asc")]),
        )?;
        self.read_rows(response)
    }

    fn update_record(
        &self,
        table: &str,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> GatewayResult<Option<Project>> {
        let response = self.send(
            self.client
                .patch(self.rest_url(table))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=representation")
                .json(&ProjectRow::from(fields)),
        )?;
        Ok(self.read_rows_by_id(id, response)?.into_iter().next())
    }

    fn delete_record(&self, table: &str, id: &ProjectId) -> GatewayResult<Option<Project>> {
        let response = self.send(
            self.client
                .delete(self.rest_url(table))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=representation"),
        )?;
        Ok(self.read_rows_by_id(id, response)?.into_iter().next())
    }

    fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        let response = self.send(self.client.get(self.storage_url(&format!("bucket/{bucket}"))))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            // Storage reports unknown buckets as 404, older versions as 400.
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            _ => ensure_success(response).map(|_| true),
        }
    }

    fn upload_blob(
        &self,
        bucket: &str,
        name: &str,
        blob: BlobUpload<'_>,
    ) -> GatewayResult<String> {
        let response = self.send(
            self.client
                .post(self.storage_url(&format!("object/{bucket}/{name}")))
                .header(
                    "Content-Type",
                    blob.content_type.unwrap_or("application/octet-stream"),
                )
                .body(blob.bytes.to_vec()),
        )?;
        if response.status() == StatusCode::CONFLICT {
            return Err(GatewayError::BlobExists {
                bucket: bucket.to_string(),
                name: name.to_string(),
            });
        }
        let body: UploadResponse = ensure_success(response)?
            .json()
            .map_err(|err| GatewayError::InvalidData(format!("upload payload: {err}")))?;

        // `Key` is `<bucket>/<path>`; the public URL wants the bare path.
        let path = body
            .key
            .as_deref()
            .and_then(|key| key.strip_prefix(&format!("{bucket}/")).map(str::to_string))
            .unwrap_or_else(|| name.to_string());
        Ok(path)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{path}", self.public_prefix(bucket))
    }

    fn remove_blob(&self, bucket: &str, name: &str) -> GatewayResult<()> {
        let response = self.send(
            self.client
                .delete(self.storage_url(&format!("object/{bucket}")))
                .json(&RemoveRequest { prefixes: [name] }),
        )?;
        ensure_success(response).map(|_| ())
    }

    fn blob_name_for_url(&self, bucket: &str, url: &str) -> Option<String> {
        blob_name_under_prefix(&self.public_prefix(bucket), url)
    }
}

fn ensure_success(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(rejected(status, &body))
}

fn rejected(status: StatusCode, body: &str) -> GatewayError {
    let message: String = body
        .replace(['\n', '\r'], " ")
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();
    GatewayError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
}

/// `22P02`: invalid text representation, e.g. `id=eq.abc` on a bigint column.
fn is_invalid_text_representation(body: &str) -> bool {
    serde_json::from_str::<PostgrestError>(body)
        .ok()
        .and_then(|error| error.code)
        .is_some_and(|code| code == "22P02")
}
