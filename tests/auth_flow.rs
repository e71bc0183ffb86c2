//! Registration, login and token checks against a running gateway

mod common;

use agrosense::auth::JwtValidator;
use common::{TestGateway, TEST_SECRET};
use serde_json::{json, Value};

#[tokio::test]
async fn test_register_then_me_resolves_identity() {
    let gw = TestGateway::spawn().await;

    let auth = gw.register("9876543210", "kharif-season").await;
    let token = auth["token"].as_str().unwrap();
    assert!(auth["expiresAt"].as_u64().is_some());

    let me: Value = gw
        .http
        .get(gw.url("/auth/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(me["id"], auth["identityId"]);
    assert_eq!(me["name"], "Lakshmi");
    assert_eq!(me["phone"], "9876543210");
    assert_eq!(me["district"], "Kheda");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let gw = TestGateway::spawn().await;
    gw.register("9876543210", "kharif-season").await;

    let response = gw
        .http
        .post(gw.url("/auth/register"))
        .json(&json!({ "name": "Other", "phone": "98765 43210", "password": "rabi-season" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("token").is_none());
    assert_eq!(body["code"], "DUPLICATE_IDENTITY");
    assert_eq!(gw.store.identity_count().await, 1);
}

#[tokio::test]
async fn test_login_checks_password() {
    let gw = TestGateway::spawn().await;
    let registered = gw.register("9876543210", "kharif-season").await;

    let wrong = gw
        .http
        .post(gw.url("/auth/login"))
        .json(&json!({ "phone": "9876543210", "password": "not-it" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);
    let body: Value = wrong.json().await.unwrap();
    assert!(body.get("token").is_none());

    let unknown = gw
        .http
        .post(gw.url("/auth/login"))
        .json(&json!({ "phone": "9000000000", "password": "kharif-season" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 401);

    let ok: Value = gw
        .http
        .post(gw.url("/api/auth/login"))
        .json(&json!({ "phone": "9876543210", "password": "kharif-season" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ok["identityId"], registered["identityId"]);
}

#[tokio::test]
async fn test_register_validates_payload() {
    let gw = TestGateway::spawn().await;

    let missing_password = gw
        .http
        .post(gw.url("/auth/register"))
        .json(&json!({ "name": "Lakshmi", "phone": "9876543210" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_password.status(), 400);

    let bad_phone = gw
        .http
        .post(gw.url("/auth/register"))
        .json(&json!({ "name": "Lakshmi", "phone": "12ab", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_phone.status(), 400);

    let not_json = gw
        .http
        .post(gw.url("/auth/register"))
        .body("name=Lakshmi")
        .send()
        .await
        .unwrap();
    assert_eq!(not_json.status(), 400);

    assert_eq!(gw.store.identity_count().await, 0);
}

#[tokio::test]
async fn test_me_rejects_bad_tokens() {
    let gw = TestGateway::spawn().await;
    let auth = gw.register("9876543210", "kharif-season").await;
    let identity = auth["identityId"].as_str().unwrap();

    let none = gw.http.get(gw.url("/auth/me")).send().await.unwrap();
    assert_eq!(none.status(), 401);

    let garbage = gw
        .http
        .get(gw.url("/auth/me"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 401);

    // Issued eight days ago with the default seven-day lifetime
    let jwt = JwtValidator::new(TEST_SECRET, 7 * 24 * 60 * 60).unwrap();
    let issued_at = chrono::Utc::now().timestamp() as u64 - 8 * 24 * 60 * 60;
    let expired = jwt.issue_at(identity, "9876543210", issued_at).unwrap();

    let response = gw
        .http
        .get(gw.url("/auth/me"))
        .bearer_auth(&expired.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Unauthenticated: Token expired");
}

#[tokio::test]
async fn test_operational_endpoints() {
    let gw = TestGateway::spawn().await;

    let banner: Value = gw.http.get(gw.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(banner["message"], "AgroSense API running");

    let health: Value = gw
        .http
        .get(gw.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["healthy"], true);
    assert_eq!(health["storage"], "memory");

    let version = gw.http.get(gw.url("/version")).send().await.unwrap();
    assert_eq!(version.status(), 200);

    let preflight = gw
        .http
        .request(reqwest::Method::OPTIONS, gw.url("/crop/scan"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), 204);
    assert_eq!(
        preflight.headers()["access-control-allow-origin"],
        "*"
    );

    let missing = gw.http.get(gw.url("/nowhere")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}
