//! Core domain logic for the folio portfolio site.
//! This crate owns the project collection and its business invariants.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod seed;
pub mod service;
pub mod session;

pub use config::{ConfigError, FolioConfig, GatewayKind};
pub use gateway::{
    BlobUpload, GatewayError, GatewayResult, HttpGateway, HttpGatewayConfig, ProjectGateway,
    SqliteGateway, PROJECTS_BUCKET, PROJECTS_TABLE,
};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::project::{
    parse_tag_input, Project, ProjectFields, ProjectId, ProjectValidationError,
};
pub use service::image_upload::{FallbackReason, ImageFile, UploadedImage, FALLBACK_IMAGE_URL};
pub use service::project_store::{ProjectStore, StoreError, StoreResult, StoreSettings};
pub use service::subscription::Subscription;
pub use session::{
    CredentialVerifier, KeyValueStore, SessionError, SessionGate, SqliteKeyValueStore,
    ADMIN_SESSION_KEY,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
