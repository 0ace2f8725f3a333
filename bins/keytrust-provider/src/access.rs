//! Caller checks.
//!
//! Two unrelated checks live here:
//! - [`authorize`]: is the caller registered at all? Gates every data operation.
//! - [`assert_own_package`]: does a package name belong to the calling OS process? Used only
//!   for the self-status lookup, and usable by unregistered callers.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::db;
use crate::error::{ProviderError, Result};
use crate::types::CallerId;

/// Proof that a caller passed the registration check.
///
/// Only [`authorize`] constructs this, so every operation taking one runs after the check.
#[derive(Debug, Clone)]
pub struct AuthorizedCaller {
    caller: CallerId,
}

impl AuthorizedCaller {
    pub fn caller(&self) -> &CallerId {
        &self.caller
    }

    pub fn as_str(&self) -> &str {
        self.caller.as_str()
    }
}

/// Whether the caller has completed registration.
///
/// A caller that never registered yields `Ok(false)`; store failures propagate.
pub async fn is_authorized(pool: &SqlitePool, caller: &CallerId) -> Result<bool> {
    db::api_app_exists(pool, caller.as_str()).await
}

/// Run the registration check, failing with `PermissionDenied` for unknown callers.
pub async fn authorize(pool: &SqlitePool, caller: &CallerId) -> Result<AuthorizedCaller> {
    if !is_authorized(pool, caller).await? {
        warn!(caller = %caller, "rejected unregistered caller");
        return Err(ProviderError::not_registered());
    }
    debug!(caller = %caller, "caller authorized");
    Ok(AuthorizedCaller {
        caller: caller.clone(),
    })
}

/// OS-level process introspection: which packages run under a uid.
pub trait PackageResolver: Send + Sync {
    /// Package names owned by `uid`, or `None` if the uid cannot be resolved.
    fn packages_for_uid(&self, uid: u32) -> Option<Vec<String>>;
}

/// Static uid to package table, loaded from TOML.
///
/// ```toml
/// [[uid]]
/// uid = 10042
/// packages = ["org.example.mail"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageTable {
    by_uid: HashMap<u32, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PackageTableFile {
    #[serde(default)]
    uid: Vec<UidEntry>,
}

#[derive(Debug, Deserialize)]
struct UidEntry {
    uid: u32,
    packages: Vec<String>,
}

impl PackageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add packages owned by `uid`.
    pub fn with_uid<I, S>(mut self, uid: u32, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_uid
            .entry(uid)
            .or_default()
            .extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, ConfigError> {
        let file: PackageTableFile = toml::from_str(contents)?;
        Ok(file
            .uid
            .into_iter()
            .fold(Self::new(), |table, entry| table.with_uid(entry.uid, entry.packages)))
    }

    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}

impl PackageResolver for PackageTable {
    fn packages_for_uid(&self, uid: u32) -> Option<Vec<String>> {
        self.by_uid.get(&uid).cloned()
    }
}

/// Confirm that `requested_package` belongs to the process running as `caller_uid`.
///
/// Fails with `Internal` if the uid has no packages at all (collaborator failure), and with
/// `Forbidden` if the package is not among them.
pub fn assert_own_package(
    resolver: &dyn PackageResolver,
    caller_uid: u32,
    requested_package: &str,
) -> Result<()> {
    let packages = resolver.packages_for_uid(caller_uid).ok_or_else(|| {
        ProviderError::Internal(format!(
            "failed to retrieve packages for calling uid {}",
            caller_uid
        ))
    })?;

    if !packages.iter().any(|p| p == requested_package) {
        warn!(
            uid = caller_uid,
            requested = requested_package,
            "package does not belong to caller"
        );
        return Err(ProviderError::Forbidden(
            "callers may only check the status of their own package".to_string(),
        ));
    }
    Ok(())
}
