//! Trust identity store.
//!
//! A trust identity pins a caller-chosen identifier (usually an email address) to a key. Each
//! record is owned by the application that created it and is invisible to every other caller.

use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::access::AuthorizedCaller;
use crate::db::{self, TrustIdentityRow};
use crate::error::{ProviderError, Result};
use crate::notify::{ChangeNotifier, Dataset};
use crate::types::{CallerId, MasterKeyId};

/// A caller-owned override binding an identifier to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustIdentity {
    pub id: i64,
    pub owner: CallerId,
    pub identifier: String,
    pub master_key_id: MasterKeyId,
    /// Unix seconds.
    pub last_updated: i64,
}

impl From<TrustIdentityRow> for TrustIdentity {
    fn from(row: TrustIdentityRow) -> Self {
        Self {
            id: row.id,
            owner: CallerId::new(row.package_name),
            identifier: row.identifier,
            master_key_id: MasterKeyId::new(row.master_key_id),
            last_updated: row.last_updated,
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(ProviderError::InvalidArgument(
            "identifier must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Create or replace the caller's trust identity for `identifier`.
///
/// The owner is always the authorized caller. `master_key_id` is mandatory.
pub async fn insert(
    pool: &SqlitePool,
    notifier: &ChangeNotifier,
    caller: &AuthorizedCaller,
    identifier: &str,
    master_key_id: Option<MasterKeyId>,
) -> Result<TrustIdentity> {
    validate_identifier(identifier)?;
    let master_key_id = master_key_id.ok_or_else(|| {
        ProviderError::InvalidArgument("master_key_id must be a non-null value".to_string())
    })?;

    let row = db::upsert_trust_identity(
        pool,
        caller.as_str(),
        identifier,
        master_key_id.get(),
        unix_now(),
    )
    .await?
    .ok_or_else(|| {
        // Registration was revoked between the check and the write.
        warn!(caller = %caller.caller(), "registration revoked before trust identity write");
        ProviderError::not_registered()
    })?;

    info!(
        caller = %caller.caller(),
        identifier,
        master_key_id = %master_key_id,
        "stored trust identity"
    );
    notifier.notify(Dataset::TrustIdentities);
    Ok(row.into())
}

/// Look up the caller's own trust identity for exactly `identifier`.
pub async fn query(
    pool: &SqlitePool,
    caller: &AuthorizedCaller,
    identifier: &str,
) -> Result<Option<TrustIdentity>> {
    validate_identifier(identifier)?;
    let row = db::get_trust_identity(pool, caller.as_str(), identifier).await?;
    debug!(caller = %caller.caller(), identifier, found = row.is_some(), "trust identity lookup");
    Ok(row.map(Into::into))
}

/// Delete the caller's own trust identity for exactly `identifier`.
///
/// Returns the number of records removed (0 or 1). Deleting a missing record is not an error.
pub async fn delete(
    pool: &SqlitePool,
    notifier: &ChangeNotifier,
    caller: &AuthorizedCaller,
    identifier: &str,
) -> Result<u64> {
    validate_identifier(identifier)?;
    let deleted = db::delete_trust_identity(pool, caller.as_str(), identifier).await?;

    if deleted == 0 {
        // Zero rows is either "nothing to delete" or a registration revoked mid-request.
        if !db::api_app_exists(pool, caller.as_str()).await? {
            warn!(caller = %caller.caller(), "registration revoked before trust identity delete");
            return Err(ProviderError::not_registered());
        }
        debug!(caller = %caller.caller(), identifier, "no trust identity to delete");
        return Ok(0);
    }

    info!(caller = %caller.caller(), identifier, deleted, "deleted trust identity");
    notifier.notify(Dataset::TrustIdentities);
    Ok(deleted)
}

/// Trust identities are never updated in place; re-insert to replace one.
pub fn update() -> Result<()> {
    Err(ProviderError::Unsupported(
        "trust identities cannot be updated, insert a replacement instead".to_string(),
    ))
}
