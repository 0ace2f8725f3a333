//! Engine tests for the keytrust provider.
//!
//! These tests use sqlx::test to run each case against a fresh SQLite database with the
//! provider migrations applied.

use keytrust_provider::access::{self, AuthorizedCaller};
use keytrust_provider::error::ProviderError;
use keytrust_provider::notify::{ChangeNotifier, Dataset};
use keytrust_provider::status::{self, EmailStatusQuery, EmailStatusRow, StatusResult};
use keytrust_provider::trust;
use keytrust_provider::types::{CallerId, EmailStatus, MasterKeyId, Projection};
use keytrust_test_utils::fixtures::{
    self, KeyFixture, UNVERIFIED, VERIFIED_SECRET, VERIFIED_SELF,
};
use sqlx::SqlitePool;

const MAIL_APP: &str = "org.example.mail";
const OTHER_APP: &str = "com.other.app";

async fn registered(pool: &SqlitePool, package: &str) -> AuthorizedCaller {
    fixtures::register_app(pool, package).await.unwrap();
    access::authorize(pool, &CallerId::new(package)).await.unwrap()
}

fn status_query(addresses: &[&str], fields: &str) -> EmailStatusQuery {
    EmailStatusQuery::new(
        addresses.iter().map(|a| a.to_string()).collect(),
        Projection::parse(Some(fields)).unwrap(),
        None,
    )
    .unwrap()
}

async fn resolve(
    pool: &SqlitePool,
    caller: &AuthorizedCaller,
    addresses: &[&str],
) -> Vec<EmailStatusRow> {
    let query = status_query(addresses, "email_address,email_status");
    status::resolve(pool, caller, &query).await.unwrap().rows
}

fn codes(rows: &[EmailStatusRow]) -> Vec<(&str, Option<u8>)> {
    rows.iter()
        .map(|r| (r.address.as_str(), r.status.map(EmailStatus::code)))
        .collect()
}

// ============================================================================
// Authorization
// ============================================================================

#[sqlx::test]
async fn test_unregistered_caller_is_denied(pool: SqlitePool) {
    let result = access::authorize(&pool, &CallerId::new(MAIL_APP)).await;
    assert!(matches!(result, Err(ProviderError::PermissionDenied(_))));
    assert!(!access::is_authorized(&pool, &CallerId::new(MAIL_APP)).await.unwrap());
}

#[sqlx::test]
async fn test_registered_caller_is_authorized(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    assert_eq!(caller.as_str(), MAIL_APP);
    assert!(access::is_authorized(&pool, &CallerId::new(MAIL_APP)).await.unwrap());
}

#[sqlx::test]
async fn test_store_failure_is_not_authorization(pool: SqlitePool) {
    pool.close().await;
    let result = access::authorize(&pool, &CallerId::new(MAIL_APP)).await;
    assert!(matches!(result, Err(ProviderError::Database(_))));
}

// ============================================================================
// Status resolution
// ============================================================================

#[sqlx::test]
async fn test_self_certified_user_id_resolves_to_status_2(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com"]).await;
    assert_eq!(codes(&rows), [("a@example.com", Some(2))]);
}

#[sqlx::test]
async fn test_override_path_resolves_to_status_1(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    KeyFixture::new(0xB)
        .user_id("Somebody <someone@elsewhere.org>", "someone@elsewhere.org")
        .certified_by(0xC, VERIFIED_SECRET)
        .insert(&pool)
        .await
        .unwrap();

    trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(0xB)))
        .await
        .unwrap();

    let query = status_query(&["a@example.com"], "email_address,email_status,trust_id_last_update");
    let result = status::resolve(&pool, &caller, &query).await.unwrap();
    assert_eq!(codes(&result.rows), [("a@example.com", Some(1))]);
    assert_eq!(result.rows[0].master_key_id, MasterKeyId::new(0xB));
    assert!(result.rows[0].trust_id_last_update.is_some());
    assert_eq!(result.rows[0].user_id, None);
}

#[sqlx::test]
async fn test_secret_certification_beats_self_certification(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .certified_by(0xC, VERIFIED_SECRET)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com"]).await;
    assert_eq!(codes(&rows), [("a@example.com", Some(1))]);
}

#[sqlx::test]
async fn test_level_zero_only_never_reports_a_status(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(UNVERIFIED)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com"]).await;
    assert!(rows.is_empty(), "level 0 must never surface as a status");
}

#[sqlx::test]
async fn test_uncertified_user_id_has_unknown_status(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com"]).await;
    assert_eq!(codes(&rows), [("a@example.com", None)]);
}

#[sqlx::test]
async fn test_null_verification_is_unknown(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified_unchecked(0xA)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com"]).await;
    assert_eq!(codes(&rows), [("a@example.com", None)]);
}

#[sqlx::test]
async fn test_unmatched_address_has_no_row(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["nobody@example.com", "a@example.com"]).await;
    assert_eq!(codes(&rows), [("a@example.com", Some(2))]);
}

#[sqlx::test]
async fn test_empty_batch_returns_no_rows(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let StatusResult { rows, notify } =
        status::resolve(&pool, &caller, &status_query(&[], "email_address"))
            .await
            .unwrap();
    assert!(rows.is_empty());
    assert_eq!(notify, Dataset::KeyRings);
}

#[sqlx::test]
async fn test_result_observes_key_rings(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let result = status::resolve(&pool, &caller, &status_query(&["a@example.com"], "email_address"))
        .await
        .unwrap();
    assert_eq!(result.notify, Dataset::KeyRings);
}

#[sqlx::test]
async fn test_matching_ignores_case_but_not_wildcards(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <Alice@Example.com>", "Alice@Example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();
    KeyFixture::new(0xB)
        .user_id("Not A <notalice@example.com>", "notalice@example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["alice@example.com"]).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].master_key_id, MasterKeyId::new(0xA));

    let rows = resolve(&pool, &caller, &["%@example.com", "_lice@example.com"]).await;
    assert!(rows.is_empty(), "wildcards must match literally");
}

#[sqlx::test]
async fn test_duplicate_addresses_collapse(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();

    let rows = resolve(&pool, &caller, &["a@example.com", "a@example.com"]).await;
    assert_eq!(rows.len(), 1);
}

#[sqlx::test]
async fn test_user_id_projection_splits_rows(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(0xA)
        .user_id("Alice <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .user_id("Alice (work) <a@example.com>", "a@example.com")
        .certified_by(0xC, VERIFIED_SECRET)
        .insert(&pool)
        .await
        .unwrap();

    let merged = resolve(&pool, &caller, &["a@example.com"]).await;
    assert_eq!(codes(&merged), [("a@example.com", Some(1))]);

    let query = status_query(&["a@example.com"], "email_address,user_id,email_status");
    let split = status::resolve(&pool, &caller, &query).await.unwrap().rows;
    assert_eq!(split.len(), 2);
    let by_uid: Vec<_> = split
        .iter()
        .map(|r| (r.user_id.as_deref(), r.status.map(EmailStatus::code)))
        .collect();
    assert_eq!(
        by_uid,
        [
            (Some("Alice (work) <a@example.com>"), Some(1)),
            (Some("Alice <a@example.com>"), Some(2)),
        ]
    );
}

#[sqlx::test]
async fn test_rows_bounded_by_addresses_times_keys(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    for key in 1..=3 {
        KeyFixture::new(key)
            .user_id("Shared <shared@example.com>", "shared@example.com")
            .certified(VERIFIED_SELF)
            .insert(&pool)
            .await
            .unwrap();
    }
    trust::insert(&pool, &notifier, &caller, "shared@example.com", Some(MasterKeyId::new(2)))
        .await
        .unwrap();

    let addresses = ["shared@example.com", "other@example.com"];
    let rows = resolve(&pool, &caller, &addresses).await;
    assert_eq!(rows.len(), 3);
    assert!(rows.len() <= addresses.len() * 3);
}

#[sqlx::test]
async fn test_sort_hint_is_applied(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    KeyFixture::new(1)
        .user_id("A <a@example.com>", "a@example.com")
        .certified(VERIFIED_SELF)
        .insert(&pool)
        .await
        .unwrap();
    KeyFixture::new(2)
        .user_id("B <b@example.com>", "b@example.com")
        .certified_by(9, VERIFIED_SECRET)
        .insert(&pool)
        .await
        .unwrap();

    let query = EmailStatusQuery::new(
        vec!["a@example.com".to_string(), "b@example.com".to_string()],
        Projection::parse(Some("email_address,email_status")).unwrap(),
        Some("email_address DESC".parse().unwrap()),
    )
    .unwrap();
    let rows = status::resolve(&pool, &caller, &query).await.unwrap().rows;
    assert_eq!(codes(&rows), [("b@example.com", Some(1)), ("a@example.com", Some(2))]);
}

#[sqlx::test]
async fn test_working_set_does_not_persist(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    resolve(&pool, &caller, &["a@example.com"]).await;
    resolve(&pool, &caller, &["b@example.com"]).await;

    let leftover: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_temp_master WHERE name = 'queried_addresses'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(leftover, 0);
}

// ============================================================================
// Trust identities
// ============================================================================

#[sqlx::test]
async fn test_insert_then_delete_round_trip(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();

    let inserted = trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(7)))
        .await
        .unwrap();
    assert_eq!(inserted.owner.as_str(), MAIL_APP);
    assert_eq!(inserted.master_key_id, MasterKeyId::new(7));

    let found = trust::query(&pool, &caller, "a@example.com").await.unwrap();
    assert_eq!(found, Some(inserted));

    assert_eq!(trust::delete(&pool, &notifier, &caller, "a@example.com").await.unwrap(), 1);
    assert_eq!(trust::query(&pool, &caller, "a@example.com").await.unwrap(), None);
}

#[sqlx::test]
async fn test_key_id_above_i64_max_round_trips(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();

    let key = MasterKeyId::from_json(&serde_json::json!(18446744073709551615u64)).unwrap();
    trust::insert(&pool, &notifier, &caller, "a@example.com", Some(key))
        .await
        .unwrap();

    let found = trust::query(&pool, &caller, "a@example.com").await.unwrap().unwrap();
    assert_eq!(found.master_key_id, MasterKeyId::from_unsigned(u64::MAX));
    assert_eq!(found.master_key_id.as_unsigned(), u64::MAX);
    assert_eq!(found.master_key_id.to_string(), "FFFFFFFFFFFFFFFF");
}

#[sqlx::test]
async fn test_insert_requires_key(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();

    let result = trust::insert(&pool, &notifier, &caller, "a@example.com", None).await;
    assert!(matches!(result, Err(ProviderError::InvalidArgument(_))));
    assert_eq!(fixtures::count_rows(&pool, "api_trust_identities").await.unwrap(), 0);
}

#[sqlx::test]
async fn test_delete_missing_is_zero(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    assert_eq!(trust::delete(&pool, &notifier, &caller, "nothing@example.com").await.unwrap(), 0);
    assert_eq!(trust::delete(&pool, &notifier, &caller, "nothing@example.com").await.unwrap(), 0);
}

#[sqlx::test]
async fn test_duplicate_insert_replaces(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();

    let first = trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(1)))
        .await
        .unwrap();
    let second = trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(2)))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(fixtures::count_rows(&pool, "api_trust_identities").await.unwrap(), 1);
    let found = trust::query(&pool, &caller, "a@example.com").await.unwrap().unwrap();
    assert_eq!(found.master_key_id, MasterKeyId::new(2));
}

#[sqlx::test]
async fn test_trust_identities_are_isolated_per_caller(pool: SqlitePool) {
    let mail = registered(&pool, MAIL_APP).await;
    let other = registered(&pool, OTHER_APP).await;
    let notifier = ChangeNotifier::default();
    KeyFixture::new(0xB)
        .user_id("B <b@elsewhere.org>", "b@elsewhere.org")
        .certified_by(0xC, VERIFIED_SECRET)
        .insert(&pool)
        .await
        .unwrap();

    trust::insert(&pool, &notifier, &mail, "a@example.com", Some(MasterKeyId::new(0xB)))
        .await
        .unwrap();

    assert_eq!(trust::query(&pool, &other, "a@example.com").await.unwrap(), None);
    assert_eq!(fixtures::count_trust_identities(&pool, OTHER_APP).await.unwrap(), 0);
    assert_eq!(trust::delete(&pool, &notifier, &other, "a@example.com").await.unwrap(), 0);
    assert!(resolve(&pool, &other, &["a@example.com"]).await.is_empty());

    assert!(trust::query(&pool, &mail, "a@example.com").await.unwrap().is_some());
    assert_eq!(fixtures::count_trust_identities(&pool, MAIL_APP).await.unwrap(), 1);
    assert_eq!(codes(&resolve(&pool, &mail, &["a@example.com"]).await), [("a@example.com", Some(1))]);
}

#[sqlx::test]
async fn test_revoked_caller_cannot_write(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    fixtures::revoke_app(&pool, MAIL_APP).await.unwrap();

    let result = trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(1))).await;
    assert!(matches!(result, Err(ProviderError::PermissionDenied(_))));
    assert_eq!(fixtures::count_rows(&pool, "api_trust_identities").await.unwrap(), 0);

    let result = trust::delete(&pool, &notifier, &caller, "a@example.com").await;
    assert!(matches!(result, Err(ProviderError::PermissionDenied(_))));
}

#[sqlx::test]
async fn test_revoking_app_removes_its_trust_identities(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(1)))
        .await
        .unwrap();

    fixtures::revoke_app(&pool, MAIL_APP).await.unwrap();
    assert_eq!(fixtures::count_rows(&pool, "api_trust_identities").await.unwrap(), 0);
}

#[sqlx::test]
async fn test_writes_notify_trust_identity_observers(pool: SqlitePool) {
    let caller = registered(&pool, MAIL_APP).await;
    let notifier = ChangeNotifier::default();
    let mut sub = notifier.subscribe(Dataset::TrustIdentities);

    trust::insert(&pool, &notifier, &caller, "a@example.com", Some(MasterKeyId::new(1)))
        .await
        .unwrap();
    assert!(sub.changed().await);

    trust::delete(&pool, &notifier, &caller, "a@example.com").await.unwrap();
    assert!(sub.changed().await);
}
