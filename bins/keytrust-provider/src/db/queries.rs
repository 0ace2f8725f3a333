//! Database queries for the keytrust provider.
//!
//! Every caller-controlled value is passed as a bound parameter.

use sqlx::{SqliteExecutor, SqlitePool};

use crate::db::models::{ApiAppRow, TrustIdentityRow};
use crate::error::Result;

/// Check whether an application has a registration record.
pub async fn api_app_exists<'c, E>(executor: E, package_name: &str) -> Result<bool>
where
    E: SqliteExecutor<'c>,
{
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM api_apps WHERE package_name = ?)")
            .bind(package_name)
            .fetch_one(executor)
            .await?;
    Ok(exists)
}

/// Get an application's registration record.
pub async fn get_api_app(pool: &SqlitePool, package_name: &str) -> Result<Option<ApiAppRow>> {
    let row = sqlx::query_as::<_, ApiAppRow>(
        "SELECT package_name, package_signature, created_at FROM api_apps WHERE package_name = ?",
    )
    .bind(package_name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Insert or replace the trust identity for (`package_name`, `identifier`).
///
/// The registration check is part of the statement, so a caller revoked concurrently cannot
/// land a write. Returns `None` when the caller is not registered.
///
/// # Atomicity
/// A single `INSERT OR REPLACE ... SELECT ... WHERE EXISTS` statement. A replaced record is
/// deleted and re-inserted with a new row id, never updated in place.
pub async fn upsert_trust_identity(
    pool: &SqlitePool,
    package_name: &str,
    identifier: &str,
    master_key_id: i64,
    last_updated: i64,
) -> Result<Option<TrustIdentityRow>> {
    let row = sqlx::query_as::<_, TrustIdentityRow>(
        r#"
        INSERT OR REPLACE INTO api_trust_identities (
            package_name, identifier, master_key_id, last_updated
        )
        SELECT ?, ?, ?, ?
        WHERE EXISTS (SELECT 1 FROM api_apps WHERE package_name = ?)
        RETURNING id, package_name, identifier, master_key_id, last_updated
        "#,
    )
    .bind(package_name)
    .bind(identifier)
    .bind(master_key_id)
    .bind(last_updated)
    .bind(package_name)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Get the trust identity owned by `package_name` with exactly this identifier.
pub async fn get_trust_identity(
    pool: &SqlitePool,
    package_name: &str,
    identifier: &str,
) -> Result<Option<TrustIdentityRow>> {
    let row = sqlx::query_as::<_, TrustIdentityRow>(
        r#"
        SELECT id, package_name, identifier, master_key_id, last_updated
        FROM api_trust_identities
        WHERE package_name = ? AND identifier = ?
        "#,
    )
    .bind(package_name)
    .bind(identifier)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete the trust identity owned by `package_name` with exactly this identifier.
///
/// Like [`upsert_trust_identity`], the registration check is evaluated in the same statement.
pub async fn delete_trust_identity(
    pool: &SqlitePool,
    package_name: &str,
    identifier: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM api_trust_identities
        WHERE package_name = ? AND identifier = ?
          AND EXISTS (SELECT 1 FROM api_apps WHERE package_name = ?)
        "#,
    )
    .bind(package_name)
    .bind(identifier)
    .bind(package_name)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
