//! Admin session flag with expiry.
//!
//! # Invariants
//! - `is_admin_session` never fails; storage errors read as logged out.
//! - Expired or unreadable session values are cleared on read.
//! - `set_admin_session(false)` removes the stored value.

use super::credential::CredentialVerifier;
use super::kv_store::KeyValueStore;
use super::{SessionError, SessionResult};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Fixed storage key of the admin flag.
pub const ADMIN_SESSION_KEY: &str = "isAdmin";
/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    token: String,
    expires_at_ms: i64,
}

/// Boolean admin gate persisted in local key/value storage.
pub struct SessionGate {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl SessionGate {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns whether a live admin session exists.
    pub fn is_admin_session(&self) -> bool {
        let raw = match self.store.get(ADMIN_SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                error!("event=session_check module=session status=error error={err}");
                return false;
            }
        };

        let live = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) => record.expires_at_ms > now_ms(),
            Err(_) => {
                warn!("event=session_check module=session status=invalid_value");
                false
            }
        };
        if !live {
            if let Err(err) = self.store.remove(ADMIN_SESSION_KEY) {
                error!("event=session_clear module=session status=error error={err}");
            }
        }
        live
    }

    /// Opens (`true`) or closes (`false`) the admin session.
    pub fn set_admin_session(&self, active: bool) -> SessionResult<()> {
        if !active {
            self.store.remove(ADMIN_SESSION_KEY)?;
            info!("event=session_close module=session status=ok");
            return Ok(());
        }

        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let record = SessionRecord {
            token: Uuid::new_v4().to_string(),
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        };
        let encoded =
            serde_json::to_string(&record).map_err(|err| SessionError::Encoding(err.to_string()))?;
        self.store.set(ADMIN_SESSION_KEY, &encoded)?;
        info!(
            "event=session_open module=session status=ok ttl_secs={}",
            self.ttl.as_secs()
        );
        Ok(())
    }

    /// Verifies `password` and opens a session on success.
    pub fn login(&self, verifier: &CredentialVerifier, password: &str) -> SessionResult<bool> {
        if !verifier.verify(password) {
            warn!("event=session_login module=session status=rejected");
            return Ok(false);
        }
        self.set_admin_session(true)?;
        Ok(true)
    }

    pub fn logout(&self) -> SessionResult<()> {
        self.set_admin_session(false)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
