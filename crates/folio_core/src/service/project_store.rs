//! Project store: the single source of truth for portfolio projects.
//!
//! # Responsibility
//! - Broker create/update/delete through a `ProjectGateway`.
//! - Keep a cache of the collection as last confirmed by the gateway and
//!   serve all reads from it.
//! - Delegate image uploads to gateway blob storage with a placeholder
//!   fallback.
//! - Notify subscribers after every successful mutation.
//!
//! # Invariants
//! - Reads return snapshots; callers never see the live collection.
//! - Ids are unique in the cache and always come from the gateway.
//! - Created records are appended; updated records keep their position.
//! - Validation failures and gateway failures never touch the cache and
//!   never notify.
//! - Concurrent mutations are not coordinated: the last one to complete
//!   wins. The cache lock is never held across a gateway call.

use crate::gateway::{BlobUpload, GatewayError, ProjectGateway, PROJECTS_BUCKET, PROJECTS_TABLE};
use crate::model::project::{Project, ProjectFields, ProjectId, ProjectValidationError};
use crate::seed::default_projects;
use crate::service::image_upload::{
    object_name_for, FallbackReason, ImageFile, UploadedImage, FALLBACK_IMAGE_URL,
};
use crate::service::subscription::{ListenerRegistry, Subscription};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by store mutations.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected before reaching the gateway.
    Validation(ProjectValidationError),
    /// Gateway unreachable or request rejected.
    Gateway(GatewayError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Gateway(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Gateway(err) => Some(err),
        }
    }
}

impl From<ProjectValidationError> for StoreError {
    fn from(value: ProjectValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<GatewayError> for StoreError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

/// Gateway locations and fallback used by a store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub table: String,
    pub bucket: String,
    pub fallback_image_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            table: PROJECTS_TABLE.to_string(),
            bucket: PROJECTS_BUCKET.to_string(),
            fallback_image_url: FALLBACK_IMAGE_URL.to_string(),
        }
    }
}

/// Remote-authoritative project store.
///
/// Construct one per application and share it by reference or `Arc`.
pub struct ProjectStore {
    gateway: Arc<dyn ProjectGateway>,
    settings: StoreSettings,
    projects: RwLock<Vec<Project>>,
    listeners: ListenerRegistry,
}

impl ProjectStore {
    /// Creates a store with an empty cache. Call `refresh` to load it.
    pub fn new(gateway: Arc<dyn ProjectGateway>, settings: StoreSettings) -> Self {
        Self {
            gateway,
            settings,
            projects: RwLock::new(Vec::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Creates a store and loads the collection from the gateway.
    pub fn open(gateway: Arc<dyn ProjectGateway>, settings: StoreSettings) -> StoreResult<Self> {
        let store = Self::new(gateway, settings);
        store.refresh()?;
        Ok(store)
    }

    /// Reloads the cache from the gateway.
    ///
    /// Subscribers are notified only when the collection changed.
    pub fn refresh(&self) -> StoreResult<usize> {
        let started_at = Instant::now();
        let loaded = match self.gateway.select_all(&self.settings.table) {
            Ok(projects) => dedup_by_id(projects),
            Err(err) => {
                error!(
                    "event=store_refresh module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        let count = loaded.len();
        let changed = {
            let mut projects = self.write_projects();
            let changed = *projects != loaded;
            *projects = loaded;
            changed
        };
        info!(
            "event=store_refresh module=store status=ok count={count} changed={changed} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        if changed {
            self.listeners.notify_all();
        }
        Ok(count)
    }

    /// Returns a snapshot of all projects in collection order.
    pub fn list_all(&self) -> Vec<Project> {
        self.read_projects().clone()
    }

    /// Exact-match lookup by id.
    pub fn get_by_id(&self, id: &ProjectId) -> Option<Project> {
        self.read_projects()
            .iter()
            .find(|project| &project.id == id)
            .cloned()
    }

    /// Returns featured projects in collection order.
    pub fn list_featured(&self) -> Vec<Project> {
        self.read_projects()
            .iter()
            .filter(|project| project.featured)
            .cloned()
            .collect()
    }

    /// Returns at most `limit` featured projects for promotional slots.
    pub fn featured_preview(&self, limit: usize) -> Vec<Project> {
        self.read_projects()
            .iter()
            .filter(|project| project.featured)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns projects carrying `tag` exactly, in collection order.
    pub fn list_by_tag(&self, tag: &str) -> Vec<Project> {
        self.read_projects()
            .iter()
            .filter(|project| project.tags.iter().any(|candidate| candidate == tag))
            .cloned()
            .collect()
    }

    /// Returns the sorted set of tags used by any project.
    pub fn all_tags(&self) -> Vec<String> {
        self.read_projects()
            .iter()
            .flat_map(|project| project.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns up to `limit` other projects sharing a tag with `id`.
    pub fn related(&self, id: &ProjectId, limit: usize) -> Vec<Project> {
        let projects = self.read_projects();
        let Some(target) = projects.iter().find(|project| &project.id == id) else {
            return Vec::new();
        };
        projects
            .iter()
            .filter(|project| &project.id != id && project.shares_tag_with(target))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Creates a project through the gateway and appends it to the cache.
    pub fn create(&self, fields: ProjectFields) -> StoreResult<Project> {
        let started_at = Instant::now();
        if let Err(err) = fields.validate() {
            warn!(
                "event=project_create module=store status=rejected field={}",
                err.field()
            );
            return Err(err.into());
        }

        let created = match self
            .gateway
            .insert_record(&self.settings.table, &fields)
        {
            Ok(project) => project,
            Err(err) => {
                error!(
                    "event=project_create module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        {
            let mut projects = self.write_projects();
            projects.retain(|project| project.id != created.id);
            projects.push(created.clone());
        }
        info!(
            "event=project_create module=store status=ok id={} duration_ms={}",
            created.id,
            started_at.elapsed().as_millis()
        );
        self.listeners.notify_all();
        Ok(created)
    }

    /// Replaces every field of project `id`, keeping its id and position.
    ///
    /// Returns `Ok(None)` when the gateway does not know `id`.
    pub fn update(&self, id: &ProjectId, fields: ProjectFields) -> StoreResult<Option<Project>> {
        let started_at = Instant::now();
        if let Err(err) = fields.validate() {
            warn!(
                "event=project_update module=store status=rejected id={id} field={}",
                err.field()
            );
            return Err(err.into());
        }

        let updated = match self
            .gateway
            .update_record(&self.settings.table, id, &fields)
        {
            Ok(Some(project)) => project,
            Ok(None) => {
                info!("event=project_update module=store status=not_found id={id}");
                return Ok(None);
            }
            Err(err) => {
                error!(
                    "event=project_update module=store status=error id={id} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        {
            let mut projects = self.write_projects();
            match projects.iter().position(|project| &project.id == id) {
                Some(index) => projects[index] = updated.clone(),
                None => {
                    debug!("event=project_update module=store status=cache_miss id={id}");
                    projects.push(updated.clone());
                }
            }
        }
        info!(
            "event=project_update module=store status=ok id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        self.listeners.notify_all();
        Ok(Some(updated))
    }

    /// Deletes project `id` and, best-effort, its gateway-owned image.
    ///
    /// The image is taken from the record the gateway removed, so records
    /// not yet in the cache are cleaned up too.
    /// Returns `Ok(false)` when the gateway does not know `id`.
    pub fn delete(&self, id: &ProjectId) -> StoreResult<bool> {
        let started_at = Instant::now();
        let removed = match self.gateway.delete_record(&self.settings.table, id) {
            Ok(Some(project)) => project,
            Ok(None) => {
                info!("event=project_delete module=store status=not_found id={id}");
                return Ok(false);
            }
            Err(err) => {
                error!(
                    "event=project_delete module=store status=error id={id} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        self.remove_owned_image(id, &removed.image);
        self.write_projects().retain(|project| &project.id != id);
        info!(
            "event=project_delete module=store status=ok id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        self.listeners.notify_all();
        Ok(true)
    }

    /// Stores image bytes in gateway blob storage.
    ///
    /// Never fails: when the bucket is missing or the gateway errors, the
    /// configured placeholder URL is returned as `UploadedImage::Placeholder`.
    /// The project collection is not touched.
    pub fn upload_image(&self, file: &ImageFile) -> UploadedImage {
        let started_at = Instant::now();
        let bucket = self.settings.bucket.as_str();
        let name = object_name_for(&file.file_name);
        debug!(
            "event=image_upload module=store status=start bucket={bucket} name={name} size_bytes={}",
            file.bytes.len()
        );

        match self.gateway.bucket_exists(bucket) {
            Ok(true) => {}
            Ok(false) => {
                warn!("event=image_upload module=store status=fallback reason=bucket_missing bucket={bucket}");
                return self.placeholder(FallbackReason::BucketMissing);
            }
            Err(err) => {
                warn!(
                    "event=image_upload module=store status=fallback reason=bucket_check_failed bucket={bucket} error={err}"
                );
                return self.placeholder(FallbackReason::Gateway(err.to_string()));
            }
        }

        let blob = BlobUpload {
            bytes: &file.bytes,
            content_type: file.content_type.as_deref(),
        };
        match self.gateway.upload_blob(bucket, &name, blob) {
            Ok(path) => {
                let url = self.gateway.public_url(bucket, &path);
                info!(
                    "event=image_upload module=store status=ok bucket={bucket} path={path} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                UploadedImage::Stored { url, path }
            }
            Err(err) => {
                warn!(
                    "event=image_upload module=store status=fallback reason=upload_failed bucket={bucket} name={name} error={err}"
                );
                self.placeholder(FallbackReason::Gateway(err.to_string()))
            }
        }
    }

    /// Registers a change callback run after every successful mutation.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Inserts the built-in catalog when the collection is empty.
    ///
    /// Returns how many projects were inserted.
    pub fn seed_if_empty(&self) -> StoreResult<usize> {
        if !self.read_projects().is_empty() {
            debug!("event=store_seed module=store status=skipped reason=not_empty");
            return Ok(0);
        }

        let mut inserted = 0;
        for fields in default_projects() {
            self.create(fields)?;
            inserted += 1;
        }
        info!("event=store_seed module=store status=ok inserted={inserted}");
        Ok(inserted)
    }

    fn placeholder(&self, reason: FallbackReason) -> UploadedImage {
        UploadedImage::Placeholder {
            url: self.settings.fallback_image_url.clone(),
            reason,
        }
    }

    fn remove_owned_image(&self, id: &ProjectId, image: &str) {
        let bucket = self.settings.bucket.as_str();
        let Some(name) = self.gateway.blob_name_for_url(bucket, image) else {
            return;
        };
        match self.gateway.remove_blob(bucket, &name) {
            Ok(()) => debug!(
                "event=image_remove module=store status=ok id={id} bucket={bucket} name={name}"
            ),
            Err(err) => warn!(
                "event=image_remove module=store status=error id={id} bucket={bucket} name={name} error={err}"
            ),
        }
    }

    fn read_projects(&self) -> RwLockReadGuard<'_, Vec<Project>> {
        self.projects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_projects(&self) -> RwLockWriteGuard<'_, Vec<Project>> {
        self.projects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops later records that repeat an id already seen.
fn dedup_by_id(projects: Vec<Project>) -> Vec<Project> {
    let mut seen = BTreeSet::new();
    projects
        .into_iter()
        .filter(|project| {
            let fresh = seen.insert(project.id.clone());
            if !fresh {
                warn!(
                    "event=store_refresh module=store status=duplicate_id id={}",
                    project.id
                );
            }
            fresh
        })
        .collect()
}
