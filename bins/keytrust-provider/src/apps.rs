//! Application registration records.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::access::{self, PackageResolver};
use crate::db::{self, ApiAppRow};
use crate::error::Result;

/// A completed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiApp {
    pub package_name: String,
    pub package_signature: Vec<u8>,
    pub created_at: i64,
}

impl From<ApiAppRow> for ApiApp {
    fn from(row: ApiAppRow) -> Self {
        Self {
            package_name: row.package_name,
            package_signature: row.package_signature,
            created_at: row.created_at,
        }
    }
}

/// Fetch the registration of the calling package itself.
///
/// Unregistered callers may ask; the answer is `None` for them. Asking about any package not
/// owned by `caller_uid` is forbidden.
pub async fn own_registration(
    pool: &SqlitePool,
    resolver: &dyn PackageResolver,
    caller_uid: u32,
    package_name: &str,
) -> Result<Option<ApiApp>> {
    access::assert_own_package(resolver, caller_uid, package_name)?;
    let row = db::get_api_app(pool, package_name).await?;
    debug!(
        uid = caller_uid,
        package = package_name,
        registered = row.is_some(),
        "registration lookup"
    );
    Ok(row.map(Into::into))
}
