//! Email status resolution.
//!
//! Resolving a batch of addresses happens in three stages:
//!
//! 1. The addresses are loaded into a `TEMP` table on a connection held exclusively for the
//!    request. The surrounding transaction is always rolled back, which discards the table.
//! 2. One statement collects candidate rows from two independent paths, each tagged with its
//!    [`MatchOrigin`]:
//!    - user ids whose email matches a queried address;
//!    - the caller's own trust identities whose identifier matches one.
//!
//!    Each candidate is left-joined to the certifications of the matched key.
//! 3. [`aggregate`] folds candidates into one row per (address, key[, user id]) and remaps the
//!    strongest certification to the external status code.

use std::collections::BTreeMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::access::AuthorizedCaller;
use crate::error::{ProviderError, Result};
use crate::notify::Dataset;
use crate::types::{
    EmailStatus, EmailStatusField, MasterKeyId, Projection, SortOrder, VerificationLevel,
};

/// Addresses inserted per statement when filling the working set.
const INSERT_BATCH_SIZE: usize = 400;

const CREATE_WORKING_SET: &str = r#"
    CREATE TEMP TABLE queried_addresses (
        address TEXT PRIMARY KEY NOT NULL,
        pattern TEXT NOT NULL
    )
"#;

const ORIGIN_USER_ID: i64 = 0;
const ORIGIN_TRUST_IDENTITY: i64 = 1;

// Bind: calling package name.
const SELECT_CANDIDATES: &str = r#"
    SELECT q.address AS address,
           0 AS origin,
           up.master_key_id AS master_key_id,
           up.user_id AS user_id,
           NULL AS last_updated,
           c.verified AS verified
    FROM temp.queried_addresses AS q
    JOIN user_packets AS up
      ON up.user_id IS NOT NULL
     AND up.email LIKE q.pattern ESCAPE '\'
    LEFT JOIN certs AS c
      ON c.master_key_id = up.master_key_id
     AND c.rank = up.rank
    UNION ALL
    SELECT q.address,
           1,
           t.master_key_id,
           NULL,
           t.last_updated,
           c.verified
    FROM temp.queried_addresses AS q
    JOIN api_trust_identities AS t
      ON t.package_name = ?
     AND t.identifier LIKE q.pattern ESCAPE '\'
    LEFT JOIN certs AS c
      ON c.master_key_id = t.master_key_id
"#;

/// A validated email status request.
#[derive(Debug, Clone)]
pub struct EmailStatusQuery {
    addresses: Vec<String>,
    projection: Projection<EmailStatusField>,
    sort: SortOrder,
}

impl EmailStatusQuery {
    /// Validate a batch. Empty, whitespace-only or NUL-containing addresses are rejected.
    ///
    /// Without a sort hint results are ordered by address, ascending.
    pub fn new(
        addresses: Vec<String>,
        projection: Projection<EmailStatusField>,
        sort: Option<SortOrder>,
    ) -> Result<Self> {
        if let Some(bad) = addresses
            .iter()
            .find(|a| a.trim().is_empty() || a.contains('\0'))
        {
            return Err(ProviderError::InvalidArgument(format!(
                "malformed address in batch: {:?}",
                bad
            )));
        }
        Ok(Self {
            addresses,
            projection,
            sort: sort.unwrap_or_default(),
        })
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn projection(&self) -> &Projection<EmailStatusField> {
        &self.projection
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }
}

/// One resolved (address, key) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailStatusRow {
    /// The address as submitted by the caller.
    pub address: String,
    pub master_key_id: MasterKeyId,
    pub user_id: Option<String>,
    /// `None` when no usable certification was found.
    pub status: Option<EmailStatus>,
    /// Set when a trust identity contributed to this row.
    pub trust_id_last_update: Option<i64>,
}

/// Rows plus the dataset whose changes invalidate them.
#[derive(Debug, Clone)]
pub struct StatusResult {
    pub rows: Vec<EmailStatusRow>,
    pub notify: Dataset,
}

/// How a candidate key was reached from a queried address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOrigin {
    /// A user id packet whose email matched.
    UserId(String),
    /// One of the caller's trust identities matched.
    TrustIdentity { last_updated: i64 },
}

/// A pre-aggregation join result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: String,
    pub master_key_id: MasterKeyId,
    pub origin: MatchOrigin,
    /// Raw `certs.verified`; `None` when the key has no certification row.
    pub verified: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    address: String,
    origin: i64,
    master_key_id: i64,
    user_id: Option<String>,
    last_updated: Option<i64>,
    verified: Option<i64>,
}

impl CandidateRow {
    fn into_candidate(self) -> Option<Candidate> {
        let origin = match (self.origin, self.user_id, self.last_updated) {
            (ORIGIN_USER_ID, Some(user_id), _) => MatchOrigin::UserId(user_id),
            (ORIGIN_TRUST_IDENTITY, _, Some(last_updated)) => {
                MatchOrigin::TrustIdentity { last_updated }
            }
            _ => return None,
        };
        Some(Candidate {
            address: self.address,
            master_key_id: MasterKeyId::new(self.master_key_id),
            origin,
            verified: self.verified,
        })
    }
}

/// Turn an address into a `LIKE` pattern that matches it literally, ignoring ASCII case.
pub fn like_pattern(address: &str) -> String {
    let mut pattern = String::with_capacity(address.len());
    for c in address.trim().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern
}

/// Resolve the verification status of a batch of addresses for an authorized caller.
pub async fn resolve(
    pool: &SqlitePool,
    caller: &AuthorizedCaller,
    query: &EmailStatusQuery,
) -> Result<StatusResult> {
    let group_by_user_id = query.projection.contains(EmailStatusField::UserId);

    let candidates = if query.addresses.is_empty() {
        Vec::new()
    } else {
        fetch_candidates(pool, caller, &query.addresses).await?
    };
    let candidate_count = candidates.len();

    let mut rows = aggregate(candidates, group_by_user_id);
    sort_rows(&mut rows, query.sort);

    debug!(
        caller = %caller.caller(),
        addresses = query.addresses.len(),
        candidates = candidate_count,
        rows = rows.len(),
        group_by_user_id,
        "resolved email status"
    );

    Ok(StatusResult {
        rows,
        notify: Dataset::KeyRings,
    })
}

async fn fetch_candidates(
    pool: &SqlitePool,
    caller: &AuthorizedCaller,
    addresses: &[String],
) -> Result<Vec<Candidate>> {
    let mut tx = pool.begin().await?;

    sqlx::query(CREATE_WORKING_SET).execute(&mut *tx).await?;

    for chunk in addresses.chunks(INSERT_BATCH_SIZE) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT OR IGNORE INTO temp.queried_addresses (address, pattern) ");
        builder.push_values(chunk, |mut row, address| {
            row.push_bind(address.as_str())
                .push_bind(like_pattern(address));
        });
        builder.build().execute(&mut *tx).await?;
    }

    let rows = sqlx::query_as::<_, CandidateRow>(SELECT_CANDIDATES)
        .bind(caller.as_str())
        .fetch_all(&mut *tx)
        .await?;

    // Nothing here is meant to persist; rolling back drops the working set.
    tx.rollback().await?;

    Ok(rows
        .into_iter()
        .filter_map(CandidateRow::into_candidate)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    address: String,
    master_key_id: MasterKeyId,
    user_id: Option<String>,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    min_level: Option<i64>,
    user_id: Option<String>,
    trust_id_last_update: Option<i64>,
}

/// Fold candidates into one row per (address, key), plus user id when `group_by_user_id`.
///
/// Level 0 certifications are dropped before grouping; a group left with no certification at
/// all gets an unknown status. User id text only comes from user id matches and the trust
/// timestamp only from trust identity matches.
pub fn aggregate<I>(candidates: I, group_by_user_id: bool) -> Vec<EmailStatusRow>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();

    for candidate in candidates {
        if matches!(candidate.verified, Some(level) if level <= 0) {
            continue;
        }

        let (user_id, last_updated) = match candidate.origin {
            MatchOrigin::UserId(user_id) => (Some(user_id), None),
            MatchOrigin::TrustIdentity { last_updated } => (None, Some(last_updated)),
        };

        let key = GroupKey {
            address: candidate.address,
            master_key_id: candidate.master_key_id,
            user_id: if group_by_user_id { user_id.clone() } else { None },
        };
        let group = groups.entry(key).or_default();

        if let Some(level) = candidate.verified {
            group.min_level = Some(group.min_level.map_or(level, |min| min.min(level)));
        }
        if let Some(user_id) = user_id {
            if group.user_id.as_ref().is_none_or(|current| user_id < *current) {
                group.user_id = Some(user_id);
            }
        }
        if last_updated.is_some() {
            group.trust_id_last_update = group.trust_id_last_update.max(last_updated);
        }
    }

    groups
        .into_iter()
        .map(|(key, group)| EmailStatusRow {
            address: key.address,
            master_key_id: key.master_key_id,
            user_id: group.user_id,
            status: group
                .min_level
                .and_then(VerificationLevel::from_raw)
                .and_then(EmailStatus::from_level),
            trust_id_last_update: group.trust_id_last_update,
        })
        .collect()
}

/// Order rows by the sort hint, then by (address, key, user id).
pub fn sort_rows(rows: &mut [EmailStatusRow], order: SortOrder) {
    rows.sort_by(|a, b| {
        let primary = match order.field {
            EmailStatusField::EmailAddress => a.address.cmp(&b.address),
            EmailStatusField::UserId => a.user_id.cmp(&b.user_id),
            EmailStatusField::EmailStatus => a.status.cmp(&b.status),
            EmailStatusField::TrustIdLastUpdate => {
                a.trust_id_last_update.cmp(&b.trust_id_last_update)
            }
            EmailStatusField::MasterKeyId => a.master_key_id.cmp(&b.master_key_id),
        };
        let primary = if order.descending {
            primary.reverse()
        } else {
            primary
        };
        primary
            .then_with(|| a.address.cmp(&b.address))
            .then_with(|| a.master_key_id.cmp(&b.master_key_id))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}
