#![allow(dead_code)]

use folio_core::{
    BlobUpload, GatewayError, GatewayResult, Project, ProjectFields, ProjectGateway, ProjectId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

pub const FAKE_STORAGE_URL: &str = "https://fake.example/storage";

/// In-memory gateway with switchable failures.
pub struct FakeGateway {
    records: Mutex<Vec<Project>>,
    next_id: AtomicI64,
    buckets: Mutex<BTreeSet<String>>,
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    removed: Mutex<Vec<String>>,
    pub fail_records: AtomicBool,
    pub fail_blobs: AtomicBool,
    pub fail_remove: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::with_buckets(&["projects"])
    }

    pub fn with_buckets(buckets: &[&str]) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            buckets: Mutex::new(buckets.iter().map(|b| b.to_string()).collect()),
            blobs: Mutex::new(BTreeMap::new()),
            removed: Mutex::new(Vec::new()),
            fail_records: AtomicBool::new(false),
            fail_blobs: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }

    /// Inserts a record behind the store's back.
    pub fn insert_external(&self, fields: &ProjectFields) -> Project {
        self.insert_record("projects", fields).unwrap()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn blob_names(&self) -> Vec<String> {
        self.blobs
            .lock()
            .unwrap()
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn removed_blobs(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> GatewayResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(GatewayError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ProjectGateway for FakeGateway {
    fn insert_record(&self, _table: &str, fields: &ProjectFields) -> GatewayResult<Project> {
        self.check(&self.fail_records)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let project = fields.clone().with_id(ProjectId::from(id));
        self.records.lock().unwrap().push(project.clone());
        Ok(project)
    }

    fn select_all(&self, _table: &str) -> GatewayResult<Vec<Project>> {
        self.check(&self.fail_records)?;
        Ok(self.records.lock().unwrap().clone())
    }

    fn update_record(
        &self,
        _table: &str,
        id: &ProjectId,
        fields: &ProjectFields,
    ) -> GatewayResult<Option<Project>> {
        self.check(&self.fail_records)?;
        let mut records = self.records.lock().unwrap();
        let Some(slot) = records.iter_mut().find(|project| &project.id == id) else {
            return Ok(None);
        };
        *slot = fields.clone().with_id(id.clone());
        Ok(Some(slot.clone()))
    }

    fn delete_record(&self, _table: &str, id: &ProjectId) -> GatewayResult<Option<Project>> {
        self.check(&self.fail_records)?;
        let mut records = self.records.lock().unwrap();
        let Some(index) = records.iter().position(|project| &project.id == id) else {
            return Ok(None);
        };
        Ok(Some(records.remove(index)))
    }

    fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        self.check(&self.fail_blobs)?;
        Ok(self.buckets.lock().unwrap().contains(bucket))
    }

    fn upload_blob(
        &self,
        bucket: &str,
        name: &str,
        blob: BlobUpload<'_>,
    ) -> GatewayResult<String> {
        self.check(&self.fail_blobs)?;
        let key = (bucket.to_string(), name.to_string());
        let mut blobs = self.blobs.lock().unwrap();
        if blobs.contains_key(&key) {
            return Err(GatewayError::BlobExists {
                bucket: bucket.to_string(),
                name: name.to_string(),
            });
        }
        blobs.insert(key, blob.bytes.to_vec());
        Ok(name.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{FAKE_STORAGE_URL}/{bucket}/{path}")
    }

    fn remove_blob(&self, bucket: &str, name: &str) -> GatewayResult<()> {
        self.check(&self.fail_remove)?;
        self.removed.lock().unwrap().push(name.to_string());
        self.blobs
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), name.to_string()));
        Ok(())
    }

    fn blob_name_for_url(&self, bucket: &str, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{FAKE_STORAGE_URL}/{bucket}/"))
            .map(str::to_string)
    }
}

pub fn demo_fields() -> ProjectFields {
    ProjectFields {
        title: "Demo".to_string(),
        description: "d".to_string(),
        image: "http://x/img.png".to_string(),
        tags: vec!["a".to_string(), "b".to_string()],
        ..ProjectFields::default()
    }
}

pub fn fields_with(title: &str, tags: &[&str], featured: bool) -> ProjectFields {
    ProjectFields {
        title: title.to_string(),
        description: format!("{title} description"),
        image: format!("http://x/{title}.png"),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        featured,
        ..ProjectFields::default()
    }
}
