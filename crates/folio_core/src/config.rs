//! TOML configuration for the composition root.
//!
//! Every section is optional; a missing file means all defaults.
//!
//! ```toml
//! [gateway]
//! kind = "http"            # or "sqlite" (default)
//! url = "https://<ref>.supabase.co"
//! api_key = "<anon key>"
//! table = "projects"
//! bucket = "projects"
//!
//! [upload]
//! fallback_image_url = "https://example.com/placeholder.png"
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/folio"
//!
//! [admin]
//! salt = "<random>"
//! password_hash = "<hex sha256>"
//! session_ttl_secs = 43200
//! ```

use crate::gateway::{
    GatewayError, HttpGateway, HttpGatewayConfig, ProjectGateway, SqliteGateway,
    PROJECTS_BUCKET, PROJECTS_TABLE,
};
use crate::service::image_upload::FALLBACK_IMAGE_URL;
use crate::service::project_store::StoreSettings;
use crate::session::gate::DEFAULT_SESSION_TTL;
use crate::session::{CredentialVerifier, SessionError};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolioConfig {
    pub gateway: GatewaySection,
    pub upload: UploadSection,
    pub logging: LoggingSection,
    pub admin: AdminSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    #[default]
    Sqlite,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySection {
    pub kind: GatewayKind,
    /// SQLite file for the self-hosted gateway.
    pub db_path: PathBuf,
    /// Prefix for blob URLs served by the self-hosted gateway.
    pub public_base_url: String,
    /// Base URL of the HTTP gateway.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub bucket: String,
    pub timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            kind: GatewayKind::Sqlite,
            db_path: PathBuf::from("folio.db"),
            public_base_url: "http://localhost:8080/media".to_string(),
            url: None,
            api_key: None,
            table: PROJECTS_TABLE.to_string(),
            bucket: PROJECTS_BUCKET.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSection {
    pub fallback_image_url: String,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            fallback_image_url: FALLBACK_IMAGE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Falls back to `default_log_level()` when absent.
    pub level: Option<String>,
    /// File logging is disabled when absent.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminSection {
    pub salt: Option<String>,
    pub password_hash: Option<String>,
    pub session_ttl_secs: u64,
    /// SQLite file holding the session flag.
    pub state_path: PathBuf,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            salt: None,
            password_hash: None,
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            state_path: PathBuf::from("folio-session.db"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    MissingField(&'static str),
    Gateway(GatewayError),
    Session(SessionError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file at {}: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse config file at {}: {message}", path.display())
            }
            Self::MissingField(field) => write!(f, "missing config value `{field}`"),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Session(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Gateway(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::Parse { .. } | Self::MissingField(_) => None,
        }
    }
}

impl From<GatewayError> for ConfigError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl From<SessionError> for ConfigError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl FolioConfig {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields defaults; unreadable or malformed files fail.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|err| err.to_string())
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            table: self.gateway.table.clone(),
            bucket: self.gateway.bucket.clone(),
            fallback_image_url: self.upload.fallback_image_url.clone(),
        }
    }

    /// Opens the configured gateway.
    pub fn open_gateway(&self) -> Result<Arc<dyn ProjectGateway>, ConfigError> {
        match self.gateway.kind {
            GatewayKind::Sqlite => {
                let gateway =
                    SqliteGateway::open(&self.gateway.db_path, self.gateway.public_base_url.clone())?;
                gateway.create_bucket(&self.gateway.bucket)?;
                Ok(Arc::new(gateway))
            }
            GatewayKind::Http => {
                let url = self
                    .gateway
                    .url
                    .as_deref()
                    .ok_or(ConfigError::MissingField("gateway.url"))?;
                let api_key = self
                    .gateway
                    .api_key
                    .as_deref()
                    .ok_or(ConfigError::MissingField("gateway.api_key"))?;
                let mut config = HttpGatewayConfig::new(url, api_key);
                config.timeout = Duration::from_secs(self.gateway.timeout_secs);
                Ok(Arc::new(HttpGateway::new(config)?))
            }
        }
    }

    /// Returns the admin credential verifier, if credentials are configured.
    pub fn credential_verifier(&self) -> Result<Option<CredentialVerifier>, ConfigError> {
        match (&self.admin.salt, &self.admin.password_hash) {
            (Some(salt), Some(hash)) => Ok(Some(CredentialVerifier::from_hex(salt.clone(), hash)?)),
            (None, None) => Ok(None),
            (None, Some(_)) => Err(ConfigError::MissingField("admin.salt")),
            (Some(_), None) => Err(ConfigError::MissingField("admin.password_hash")),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.admin.session_ttl_secs)
    }
}
