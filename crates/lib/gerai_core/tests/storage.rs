//! Storage-level integration tests: token rotation, the admin
//! singleton, and access-code quota accounting under concurrency.
//!
//! Each test creates its own scratch database from `DATABASE_URL` and
//! runs the embedded migrations, so they are ignored unless a
//! PostgreSQL server is reachable:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost:5432/postgres cargo test -p gerai_core -- --ignored
//! ```

use chrono::{Duration, Utc};
use gerai_core::access::queries as access_queries;
use gerai_core::access::{AccessError, codes};
use gerai_core::auth::{access_token, queries, refresh};
use gerai_core::models::{Role, RotateOutcome};
use sqlx::PgPool;

/// Scratch database that lives for one test.
struct TestDb {
    pool: PgPool,
    admin: PgPool,
    name: String,
}

impl TestDb {
    async fn create() -> Self {
        let base_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/postgres".into());
        let admin = PgPool::connect(&base_url).await.expect("connect DATABASE_URL");

        let name = format!("gerai_test_{}", uuid::Uuid::new_v4().simple());
        sqlx::query(&format!(r#"CREATE DATABASE "{name}""#))
            .execute(&admin)
            .await
            .expect("create scratch database");

        let (prefix, _) = base_url
            .rsplit_once('/')
            .expect("DATABASE_URL has a database path");
        let pool = PgPool::connect(&format!("{prefix}/{name}"))
            .await
            .expect("connect scratch database");
        gerai_core::migrate::migrate(&pool).await.expect("migrations");

        Self { pool, admin, name }
    }

    async fn cleanup(self) {
        self.pool.close().await;
        let _ = sqlx::query(&format!(r#"DROP DATABASE "{}""#, self.name))
            .execute(&self.admin)
            .await;
    }
}

async fn seed_admin(pool: &PgPool) -> i64 {
    queries::create_admin(pool, "admin@toko.id", "test-password-hash")
        .await
        .expect("create admin")
}

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    queries::create_user(pool, email, "test-password-hash")
        .await
        .expect("create user")
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn refresh_rotation_lifecycle() {
    let db = TestDb::create().await;
    let user_id = seed_admin(&db.pool).await;
    let now = Utc::now();

    // Login stores the first refresh token.
    let first = refresh::generate();
    let first_hash = access_token::hash_token(&first);
    queries::upsert_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &first_hash,
        now + Duration::days(30),
    )
    .await
    .expect("store refresh token");

    // Rotation swaps in a new hash.
    let second = refresh::generate();
    let second_hash = access_token::hash_token(&second);
    let outcome = queries::rotate_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &first_hash,
        &second_hash,
        now,
    )
    .await
    .expect("rotate");
    assert!(matches!(outcome, RotateOutcome::Rotated { .. }));

    // The superseded token no longer rotates.
    let replay = queries::rotate_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &first_hash,
        &access_token::hash_token(&refresh::generate()),
        now,
    )
    .await
    .expect("rotate replay");
    assert_eq!(replay, RotateOutcome::Mismatch);

    // Logout revokes by hash; the revoked mark is terminal.
    queries::revoke_refresh_token_by_hash(&db.pool, Role::Admin, &second_hash)
        .await
        .expect("revoke");
    let after_logout = queries::rotate_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &second_hash,
        &access_token::hash_token(&refresh::generate()),
        now,
    )
    .await
    .expect("rotate after logout");
    assert_eq!(after_logout, RotateOutcome::Revoked);

    // A fresh login overwrites the record and clears the marks.
    let third = refresh::generate();
    let third_hash = access_token::hash_token(&third);
    queries::upsert_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &third_hash,
        now + Duration::days(30),
    )
    .await
    .expect("re-login");
    let record = queries::refresh_token_record(&db.pool, user_id, Role::Admin)
        .await
        .expect("record")
        .expect("record exists");
    assert!(record.revoked_at.is_none());
    assert!(record.rotated_at.is_none());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn rotation_reports_expiry_and_absence() {
    let db = TestDb::create().await;
    let user_id = seed_user(&db.pool, "budi@toko.id").await;
    let now = Utc::now();

    let missing = queries::rotate_refresh_token(&db.pool, user_id, Role::User, "aa", "bb", now)
        .await
        .expect("rotate");
    assert_eq!(missing, RotateOutcome::NotFound);

    let hash = access_token::hash_token(&refresh::generate());
    queries::upsert_refresh_token(&db.pool, user_id, Role::User, &hash, now - Duration::hours(1))
        .await
        .expect("store expired token");
    let expired = queries::rotate_refresh_token(&db.pool, user_id, Role::User, &hash, "bb", now)
        .await
        .expect("rotate");
    assert_eq!(expired, RotateOutcome::Expired);

    db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn concurrent_rotation_has_one_winner() {
    let db = TestDb::create().await;
    let user_id = seed_admin(&db.pool).await;
    let now = Utc::now();

    let current = refresh::generate();
    let current_hash = access_token::hash_token(&current);
    queries::upsert_refresh_token(
        &db.pool,
        user_id,
        Role::Admin,
        &current_hash,
        now + Duration::days(30),
    )
    .await
    .expect("store refresh token");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = db.pool.clone();
        let old_hash = current_hash.clone();
        handles.push(tokio::spawn(async move {
            let new_hash = access_token::hash_token(&refresh::generate());
            queries::rotate_refresh_token(&pool, user_id, Role::Admin, &old_hash, &new_hash, now)
                .await
                .expect("rotate")
        }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.expect("join") {
            RotateOutcome::Rotated { .. } => winners += 1,
            RotateOutcome::Mismatch => losers += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(winners, 1, "exactly one rotation must win");
    assert_eq!(losers, 7);

    db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn admin_singleton_survives_concurrent_bootstrap() {
    let db = TestDb::create().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let pool = db.pool.clone();
        handles.push(tokio::spawn(async move {
            queries::create_admin(&pool, &format!("admin{i}@toko.id"), "hash").await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => created += 1,
            Err(gerai_core::auth::AuthError::AdminExists) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1, "only one admin may ever be created");
    assert_eq!(queries::count_admins(&db.pool).await.expect("count"), 1);

    db.cleanup().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn one_use_code_cannot_be_redeemed_twice() {
    let db = TestDb::create().await;
    let now = Utc::now();

    let plain = codes::generate_token();
    let hash = codes::hash_token(&plain);
    let code = access_queries::create_access_code(&db.pool, None, "product:*", &hash, Some(1), None)
        .await
        .expect("create code");

    let mut handles = Vec::new();
    for _ in 0..2 {
        let pool = db.pool.clone();
        let hash = hash.clone();
        handles.push(tokio::spawn(async move {
            access_queries::verify_and_consume(&pool, &hash, now).await
        }));
    }

    let mut redeemed = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(Some(_)) => redeemed += 1,
            Ok(None) => {}
            Err(AccessError::QuotaRace) => panic!("row lock should prevent quota races"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(redeemed, 1, "a one-use code must redeem exactly once");

    let stored = access_queries::get_access_code(&db.pool, code.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.used_count, 1);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn ineligible_codes_do_not_redeem() {
    let db = TestDb::create().await;
    let now = Utc::now();

    // Expired.
    let expired_hash = codes::hash_token(&codes::generate_token());
    access_queries::create_access_code(
        &db.pool,
        Some("kadaluarsa"),
        "product:1",
        &expired_hash,
        None,
        Some(now - Duration::hours(1)),
    )
    .await
    .expect("create expired");
    assert!(
        access_queries::verify_and_consume(&db.pool, &expired_hash, now)
            .await
            .expect("consume")
            .is_none()
    );

    // Disabled: still visible to the pre-lookup, not redeemable.
    let disabled_hash = codes::hash_token(&codes::generate_token());
    let disabled =
        access_queries::create_access_code(&db.pool, None, "product:2", &disabled_hash, None, None)
            .await
            .expect("create");
    access_queries::update_access_code(
        &db.pool,
        disabled.id,
        access_queries::AccessCodeUpdate {
            enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .expect("disable");
    assert!(
        access_queries::verify_and_consume(&db.pool, &disabled_hash, now)
            .await
            .expect("consume")
            .is_none()
    );
    assert!(
        access_queries::find_access_code_by_hash(&db.pool, &disabled_hash)
            .await
            .expect("lookup")
            .is_some()
    );

    // Soft-deleted: invisible everywhere.
    let deleted_hash = codes::hash_token(&codes::generate_token());
    let deleted =
        access_queries::create_access_code(&db.pool, None, "product:3", &deleted_hash, None, None)
            .await
            .expect("create");
    assert!(
        access_queries::soft_delete_access_code(&db.pool, deleted.id)
            .await
            .expect("delete")
    );
    // Second delete is a no-op.
    assert!(
        !access_queries::soft_delete_access_code(&db.pool, deleted.id)
            .await
            .expect("delete again")
    );
    assert!(
        access_queries::find_access_code_by_hash(&db.pool, &deleted_hash)
            .await
            .expect("lookup")
            .is_none()
    );
    assert!(
        access_queries::verify_and_consume(&db.pool, &deleted_hash, now)
            .await
            .expect("consume")
            .is_none()
    );

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn code_update_rotate_and_listing() {
    let db = TestDb::create().await;

    let hash = codes::hash_token(&codes::generate_token());
    let code = access_queries::create_access_code(
        &db.pool,
        Some("drop lebaran"),
        "drop:lebaran-2026",
        &hash,
        Some(5),
        None,
    )
    .await
    .expect("create");

    // Partial update: clear the label, leave everything else.
    let updated = access_queries::update_access_code(
        &db.pool,
        code.id,
        access_queries::AccessCodeUpdate {
            label: Some(None),
            ..Default::default()
        },
    )
    .await
    .expect("update")
    .expect("exists");
    assert_eq!(updated.label, None);
    assert_eq!(updated.scope, "drop:lebaran-2026");
    assert_eq!(updated.max_uses, Some(5));

    // Burn a use, then rotate: counting restarts for the new secret.
    access_queries::verify_and_consume(&db.pool, &hash, Utc::now())
        .await
        .expect("consume");
    let new_hash = codes::hash_token(&codes::generate_token());
    let rotated = access_queries::rotate_access_code_token(&db.pool, code.id, &new_hash)
        .await
        .expect("rotate")
        .expect("exists");
    assert_eq!(rotated.used_count, 0);
    assert!(
        access_queries::verify_and_consume(&db.pool, &hash, Utc::now())
            .await
            .expect("consume old")
            .is_none(),
        "old secret must stop working after rotation"
    );

    // Listing filters by label/scope substring and skips deleted rows.
    let other_hash = codes::hash_token(&codes::generate_token());
    let other =
        access_queries::create_access_code(&db.pool, Some("promo"), "product:9", &other_hash, None, None)
            .await
            .expect("create other");
    access_queries::soft_delete_access_code(&db.pool, other.id)
        .await
        .expect("delete other");

    let (items, total) = access_queries::list_access_codes(&db.pool, Some("lebaran"), 1, 20)
        .await
        .expect("list");
    assert_eq!(total, 1);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, code.id);

    let (all, all_total) = access_queries::list_access_codes(&db.pool, None, 1, 20)
        .await
        .expect("list all");
    assert_eq!(all_total, 1, "deleted codes are invisible");
    assert_eq!(all.len(), 1);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn bearer_token_introspection_joins_live_role() {
    let db = TestDb::create().await;
    let now = Utc::now();
    let user_id = seed_user(&db.pool, "budi@toko.id").await;

    let token_hash = access_token::hash_token("user-bearer-token");
    queries::upsert_access_token(
        &db.pool,
        user_id,
        Role::User,
        &token_hash,
        now + Duration::hours(10),
    )
    .await
    .expect("store");

    // Valid in its own namespace.
    let found = queries::find_valid_access_token_by_hash(&db.pool, &token_hash, Role::User, now)
        .await
        .expect("introspect");
    assert_eq!(found.map(|u| u.id), Some(user_id));

    // Never valid in the other namespace.
    assert!(
        queries::find_valid_access_token_by_hash(&db.pool, &token_hash, Role::Admin, now)
            .await
            .expect("introspect")
            .is_none()
    );

    // A record in the admin namespace is dead while the owner's live
    // role is user.
    let stray_hash = access_token::hash_token("stray-admin-token");
    queries::upsert_access_token(
        &db.pool,
        user_id,
        Role::Admin,
        &stray_hash,
        now + Duration::hours(10),
    )
    .await
    .expect("store stray");
    assert!(
        queries::find_valid_access_token_by_hash(&db.pool, &stray_hash, Role::Admin, now)
            .await
            .expect("introspect")
            .is_none()
    );

    // Expiry is enforced.
    let expired_hash = access_token::hash_token("expired-token");
    queries::upsert_access_token(
        &db.pool,
        user_id,
        Role::User,
        &expired_hash,
        now - Duration::minutes(1),
    )
    .await
    .expect("store expired");
    assert!(
        queries::find_valid_access_token_by_hash(&db.pool, &expired_hash, Role::User, now)
            .await
            .expect("introspect")
            .is_none()
    );

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn settings_and_grants() {
    let db = TestDb::create().await;
    let now = Utc::now();
    let user_id = seed_user(&db.pool, "siti@toko.id").await;

    // Nonce consumption: first insert wins, replays lose.
    assert!(
        queries::try_insert_setting(&db.pool, "SETUP_NONCE:abc", "used")
            .await
            .expect("insert")
    );
    assert!(
        !queries::try_insert_setting(&db.pool, "SETUP_NONCE:abc", "used")
            .await
            .expect("insert again")
    );

    queries::set_setting(&db.pool, "SETUP_DONE", "1")
        .await
        .expect("set");
    assert_eq!(
        queries::get_setting(&db.pool, "SETUP_DONE").await.expect("get"),
        Some("1".into())
    );

    // Grants: upsert refreshes expiry, expired grants vanish, revoke drops.
    access_queries::grant_scope(&db.pool, user_id, "product:1", Some(now - Duration::hours(1)))
        .await
        .expect("grant expired");
    assert!(
        access_queries::user_grants(&db.pool, user_id, now)
            .await
            .expect("grants")
            .is_empty()
    );

    access_queries::grant_scope(&db.pool, user_id, "product:1", Some(now + Duration::days(7)))
        .await
        .expect("re-grant");
    access_queries::grant_scope(&db.pool, user_id, "drop:lebaran", None)
        .await
        .expect("grant forever");
    let scopes: Vec<String> = access_queries::user_grants(&db.pool, user_id, now)
        .await
        .expect("grants")
        .into_iter()
        .map(|g| g.scope)
        .collect();
    assert_eq!(scopes, vec!["drop:lebaran", "product:1"]);

    access_queries::revoke_scope(&db.pool, user_id, "product:1")
        .await
        .expect("revoke");
    let scopes = access_queries::user_grants(&db.pool, user_id, now)
        .await
        .expect("grants");
    assert_eq!(scopes.len(), 1);

    db.cleanup().await;
}
