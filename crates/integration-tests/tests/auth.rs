//! Session issuing, verification and the role gate.

use chrono::{Duration, Utc};
use cookie::Cookie;
use secrecy::SecretString;
use serde_json::{Value, json};

use emporium_api::services::tokens::{COOKIE_NAME, SESSION_TTL_DAYS, SessionTokens};
use emporium_core::UserId;
use emporium_integration_tests::{PASSWORD, TestContext};

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_sets_cookie_and_returns_user() {
    let ctx = TestContext::new();

    let response = ctx
        .server
        .post("/api/auth/register")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": PASSWORD }))
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());

    let set_cookie = response.header("set-cookie");
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let response = ctx
        .server
        .post("/api/auth/register")
        .json(&json!({ "name": "Other", "email": "ada@example.com", "password": PASSWORD }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body, json!({ "success": false, "message": "User already exists" }));
}

#[tokio::test]
async fn test_register_ignores_requested_role() {
    let ctx = TestContext::new();

    let response = ctx
        .server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": PASSWORD,
            "role": "admin"
        }))
        .await;

    assert_eq!(response.status_code(), 201);
    assert_eq!(response.json::<Value>()["user"]["role"], "user");
}

#[tokio::test]
async fn test_register_validation() {
    let ctx = TestContext::new();

    let response = ctx
        .server
        .post("/api/auth/register")
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<Value>()["message"],
        "Please provide name, email and password"
    );

    let response = ctx
        .server
        .post("/api/auth/register")
        .json(&json!({ "name": "Ada", "email": "ada@example.com", "password": "short" }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        response.json::<Value>()["message"],
        "Password must be at least 8 characters"
    );
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let ctx = TestContext::new();

    let response = ctx
        .server
        .post("/api/auth/login")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["success"], false);
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let response = ctx
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": PASSWORD }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["user"]["name"], "Ada");
    assert!(!response.cookie(COOKIE_NAME).value().is_empty());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let wrong_password = ctx
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "not the password" }))
        .await;
    let unknown_email = ctx
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;

    assert_eq!(wrong_password.status_code(), 401);
    assert_eq!(unknown_email.status_code(), 401);
    assert_eq!(wrong_password.text(), unknown_email.text());
    assert_eq!(
        wrong_password.json::<Value>(),
        json!({ "success": false, "message": "Invalid email or password" })
    );
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let ctx = TestContext::new();

    let response = ctx
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "ada@example.com" }))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<Value>()["message"],
        "Please provide email and password"
    );

    let response = ctx
        .server
        .post("/api/auth/login")
        .json(&json!({ "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_logout_expires_cookie() {
    let ctx = TestContext::new();

    let response = ctx.server.post("/api/auth/logout").await;

    assert_eq!(response.status_code(), 200);
    let set_cookie = response.header("set-cookie");
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

// =============================================================================
// Session Verifier
// =============================================================================

#[tokio::test]
async fn test_me_returns_identity() {
    let ctx = TestContext::new();
    let session = ctx.register("Ada", "ada@example.com").await;

    let response = ctx.server.get("/api/auth/me").add_cookie(session).await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["user"]["role"], "user");
}

#[tokio::test]
async fn test_missing_cookie_rejected() {
    let ctx = TestContext::new();

    let response = ctx.server.get("/api/auth/me").await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<Value>()["message"],
        "Please login to continue."
    );
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let issued = Utc::now() - Duration::days(SESSION_TTL_DAYS) - Duration::minutes(1);
    let token = ctx.tokens.issue_at(UserId::new(1), issued).unwrap();

    let response = ctx
        .server
        .get("/api/auth/me")
        .add_cookie(Cookie::new(COOKIE_NAME, token))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<Value>()["message"],
        "Token is invalid or has expired. Please login again."
    );
}

#[tokio::test]
async fn test_foreign_signature_rejected() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let other = SessionTokens::new(
        &SecretString::from("Zr5Xp1Kc8Wq3Lm7Nb2Vt6Hy9Gd4Fs0Ja"),
        false,
    );
    let token = other.issue(UserId::new(1)).unwrap();

    let response = ctx
        .server
        .get("/api/auth/me")
        .add_cookie(Cookie::new(COOKIE_NAME, token))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<Value>()["message"],
        "Token is invalid or has expired. Please login again."
    );
}

#[tokio::test]
async fn test_token_for_missing_user_rejected() {
    let ctx = TestContext::new();
    let token = ctx.tokens.issue(UserId::new(999)).unwrap();

    let response = ctx
        .server
        .get("/api/auth/me")
        .add_cookie(Cookie::new(COOKIE_NAME, token))
        .await;

    assert_eq!(response.status_code(), 401);
    assert_eq!(
        response.json::<Value>()["message"],
        "User not found. Please login again."
    );
}

// =============================================================================
// Role Gate
// =============================================================================

#[tokio::test]
async fn test_non_admin_forbidden_on_admin_routes() {
    let ctx = TestContext::new();
    let session = ctx.register("Ada", "ada@example.com").await;

    let requests = [
        ctx.server.get("/api/categories"),
        ctx.server.post("/api/categories").json(&json!({ "name": "Shoes" })),
        ctx.server.delete("/api/categories/shoes"),
        ctx.server.delete("/api/products/1"),
        ctx.server.get("/api/orders"),
        ctx.server.put("/api/orders/1").json(&json!({ "isPaid": true })),
        ctx.server.delete("/api/orders/1"),
    ];

    for request in requests {
        let response = request.add_cookie(session.clone()).await;
        assert_eq!(response.status_code(), 403);
        assert_eq!(
            response.json::<Value>()["message"],
            "Access denied. Admin privileges required."
        );
    }
}

#[tokio::test]
async fn test_admin_routes_require_session_first() {
    let ctx = TestContext::new();

    let response = ctx.server.get("/api/orders").await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();

    let response = ctx.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "ok");

    let response = ctx.server.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.maybe_header("x-request-id").is_some());
}
