//! Router-level tests that need no live database: guard rejections,
//! input validation, and the health probe degrading gracefully.
//!
//! The pool is `connect_lazy` against a closed port, so any handler
//! that reaches storage fails — which is exactly what these negative
//! paths must never do before their early checks.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gerai_api::config::{ApiConfig, SetupConfig};
use gerai_api::{AppState, router};
use gerai_core::auth::keys::{Environment, TokenKeys};
use gerai_core::auth::session;
use gerai_core::models::Role;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn test_keys() -> TokenKeys {
    TokenKeys {
        sign_key: b"router-test-signing-secret-0123456789".to_vec(),
        enc_key: *b"0123456789abcdef0123456789abcdef",
        access_sign_key: b"router-test-access-secret".to_vec(),
    }
}

fn test_state() -> AppState {
    // Port 1 is never listening; storage access fails fast.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://127.0.0.1:1/gerai_router_test")
        .expect("lazy pool");
    AppState {
        pool,
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: "postgres://127.0.0.1:1/gerai_router_test".into(),
            environment: Environment::Development,
            keys: test_keys(),
            setup: SetupConfig {
                setup_key: None,
                setup_jwt_secret: None,
                admin_email: None,
            },
        },
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

#[tokio::test]
async fn health_reports_db_down_without_failing() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["dbConnected"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn guarded_route_without_session_is_generic_401() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/admin/access-codes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["ok"], false);
    assert_eq!(json["message"], "Unauthorized");
}

#[tokio::test]
async fn tampered_session_cookie_is_rejected() {
    let keys = test_keys();
    let token = session::issue(Role::Admin, "admin@toko.id", &keys).expect("issue");
    let mut tampered = token.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/admin/access-codes")
                .header(header::COOKIE, format!("admin_session={tampered}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Unauthorized");
}

#[tokio::test]
async fn user_session_never_opens_admin_routes() {
    let keys = test_keys();
    let token = session::issue(Role::User, "budi@toko.id", &keys).expect("issue");

    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/admin/access-codes")
                .header(header::COOKIE, format!("admin_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn feature_route_demands_bearer_before_anything_else() {
    let keys = test_keys();
    let token = session::issue(Role::Admin, "admin@toko.id", &keys).expect("issue");

    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/access-codes")
                .header(header::COOKIE, format!("admin_session={token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"scope":"product:*"}"#))
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Access token kosong");
}

#[tokio::test]
async fn verify_rejects_short_codes_before_storage() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/access-codes/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"code":"too-short"}"#))
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Body invalid");
}

#[tokio::test]
async fn claim_rejects_missing_code_field() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/access/claim")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{}"#))
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn setup_route_without_secrets_is_explicit_500() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/admin/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"a@b.id","password":"rahasia"}"#))
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Server env setup belum lengkap");
}

#[tokio::test]
async fn login_demands_both_fields() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/admin/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"admin@toko.id"}"#))
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Email & password wajib");
}

#[tokio::test]
async fn role_scoped_me_routes_exist_and_demand_a_session() {
    let app = router(test_state());
    for path in ["/api/auth/me", "/api/auth/admin/me", "/api/auth/user/me"] {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .expect("request");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{path}");
        let json = body_json(resp).await;
        assert_eq!(json["message"], "Unauthorized", "{path}");
    }
}

#[tokio::test]
async fn admin_session_never_opens_user_me() {
    let keys = test_keys();
    let token = session::issue(Role::Admin, "admin@toko.id", &keys).expect("issue");

    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/user/me")
                .header(header::COOKIE, format!("user_session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_without_session_is_401() {
    let app = router(test_state());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/user/token/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guest_status_reads_cookie_scopes_without_storage() {
    let state = test_state();
    let keys = state.config.keys.clone();
    let app = router(state);

    // A valid signed guest cookie round-trips through the status route.
    let (cookie, _) = {
        use gerai_api::services::access_cookie;
        access_cookie::write(
            &["product:42".to_string()],
            None,
            None,
            &access_cookie::WriteOptions::default(),
            &keys.access_sign_key,
            false,
        )
    };
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/access/status")
                .header(
                    header::COOKIE,
                    format!("product_access={}", cookie.value()),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["source"], "cookie");
    assert_eq!(json["hasAccess"], true);
    assert_eq!(json["scopes"][0], "product:42");

    // A corrupted signature degrades to no access, never an error.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/access/status")
                .header(header::COOKIE, "product_access=garbage.value")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["hasAccess"], false);
}
