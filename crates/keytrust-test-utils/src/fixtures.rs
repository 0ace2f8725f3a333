//! Database fixtures.
//!
//! Inserts respect the schema's foreign keys: key ring, then user ids, then certifications.

use sqlx::SqlitePool;

use crate::time::TEST_TIMESTAMP;

/// `certs.verified` for a user id without a valid self-certification.
pub const UNVERIFIED: i64 = 0;
/// `certs.verified` for a certification by a locally held secret key.
pub const VERIFIED_SECRET: i64 = 1;
/// `certs.verified` for a self-certification only.
pub const VERIFIED_SELF: i64 = 2;

/// Register an application with a dummy signature.
pub async fn register_app(pool: &SqlitePool, package_name: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO api_apps (package_name, package_signature, created_at) VALUES (?, ?, ?)",
    )
    .bind(package_name)
    .bind(package_name.as_bytes())
    .bind(TEST_TIMESTAMP)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove a registration. Returns the number of rows deleted.
pub async fn revoke_app(pool: &SqlitePool, package_name: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM api_apps WHERE package_name = ?")
        .bind(package_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Number of rows in a table. Table names come from test code only.
pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Number of trust identities owned by an application.
pub async fn count_trust_identities(
    pool: &SqlitePool,
    package_name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM api_trust_identities WHERE package_name = ?")
        .bind(package_name)
        .fetch_one(pool)
        .await
}

#[derive(Debug, Clone)]
struct UserIdFixture {
    user_id: Option<String>,
    email: Option<String>,
    certs: Vec<(i64, Option<i64>)>,
}

/// Builder for a public key ring with user ids and certifications.
#[derive(Debug, Clone)]
pub struct KeyFixture {
    master_key_id: i64,
    user_ids: Vec<UserIdFixture>,
}

impl KeyFixture {
    pub fn new(master_key_id: i64) -> Self {
        Self {
            master_key_id,
            user_ids: Vec::new(),
        }
    }

    /// Add a user id packet. Ranks follow insertion order; the first one is primary.
    pub fn user_id(mut self, user_id: &str, email: &str) -> Self {
        self.user_ids.push(UserIdFixture {
            user_id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            certs: Vec::new(),
        });
        self
    }

    /// Add a user attribute packet (no user id text).
    pub fn attribute(mut self) -> Self {
        self.user_ids.push(UserIdFixture {
            user_id: None,
            email: None,
            certs: Vec::new(),
        });
        self
    }

    /// Self-certify the most recently added user id at `level`.
    pub fn certified(self, level: i64) -> Self {
        let certifier = self.master_key_id;
        self.certified_by(certifier, level)
    }

    /// Certify the most recently added user id by `certifier` at `level`.
    pub fn certified_by(mut self, certifier: i64, level: i64) -> Self {
        self.last_user_id().certs.push((certifier, Some(level)));
        self
    }

    /// Add a certification row with a NULL verification level.
    pub fn certified_unchecked(mut self, certifier: i64) -> Self {
        self.last_user_id().certs.push((certifier, None));
        self
    }

    fn last_user_id(&mut self) -> &mut UserIdFixture {
        self.user_ids
            .last_mut()
            .expect("add a user id before certifying it")
    }

    pub async fn insert(self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO keyrings_public (master_key_id, key_ring_data) VALUES (?, ?)")
            .bind(self.master_key_id)
            .bind(self.master_key_id.to_be_bytes().to_vec())
            .execute(&mut *tx)
            .await?;

        for (rank, uid) in self.user_ids.iter().enumerate() {
            let rank = rank as i64;
            let name = uid
                .user_id
                .as_deref()
                .and_then(|u| u.split('<').next())
                .map(str::trim);
            sqlx::query(
                r#"
                INSERT INTO user_packets
                    (master_key_id, rank, user_id, name, email, comment, is_primary, is_revoked)
                VALUES (?, ?, ?, ?, ?, NULL, ?, 0)
                "#,
            )
            .bind(self.master_key_id)
            .bind(rank)
            .bind(uid.user_id.as_deref())
            .bind(name)
            .bind(uid.email.as_deref())
            .bind(rank == 0)
            .execute(&mut *tx)
            .await?;

            for (certifier, verified) in &uid.certs {
                sqlx::query(
                    r#"
                    INSERT INTO certs (master_key_id, rank, key_id_certifier, verified, creation)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(self.master_key_id)
                .bind(rank)
                .bind(*certifier)
                .bind(*verified)
                .bind(TEST_TIMESTAMP)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await
    }
}
