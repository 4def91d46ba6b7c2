//! Login, refresh rotation, logout and password change over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{PASSWORD, app};
use qore_core::auth::jwt::verify_access_token;
use qore_core::store::{EmployeeStore, RefreshTokenStore};
use serde_json::json;

#[tokio::test]
async fn login_issues_tokens_for_the_employee() {
    let app = app();
    let employee = app.employee("EMP010", "ada@qore.test").await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "ada@qore.test", "password": PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Login successful");
    assert_eq!(json["data"]["employee"]["id"], employee.id);
    assert!(json["data"]["employee"]["last_login"].is_string());

    let token = json["data"]["token"].as_str().unwrap();
    let claims = verify_access_token(token, app.config.jwt_secret.as_bytes()).unwrap();
    assert_eq!(claims.id, employee.id);
    assert_eq!(claims.email, "ada@qore.test");

    let refresh = json["data"]["refreshToken"].as_str().unwrap();
    let row = app.store.find_refresh_token(refresh).await.unwrap().unwrap();
    assert_eq!(row.employee_id, employee.id);
    assert!(!row.is_revoked);
    let remaining = row.expires_at - Utc::now();
    assert!(remaining > Duration::days(7) - Duration::minutes(1));
    assert!(remaining <= Duration::days(7));
}

#[tokio::test]
async fn employee_json_never_contains_the_password() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;

    let (_, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "ada@qore.test", "password": PASSWORD })),
        )
        .await;
    let employee = json["data"]["employee"].as_object().unwrap();
    assert!(!employee.contains_key("password"));
    assert!(!employee.contains_key("password_hash"));
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;

    let (s1, unknown) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "nobody@qore.test", "password": PASSWORD })),
        )
        .await;
    let (s2, wrong) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "ada@qore.test", "password": "nope-nope" })),
        )
        .await;

    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["success"], false);
    assert_eq!(unknown["message"], "Invalid email or password");
    assert_eq!(unknown["message"], wrong["message"]);
}

#[tokio::test]
async fn unreadable_stored_hash_is_a_plain_mismatch() {
    let app = app();
    let mut new = common::new_employee("EMP012", "legacy@qore.test");
    new.password_hash = "plaintext-legacy".into();
    app.store.insert_employee(new).await.unwrap();

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "legacy@qore.test", "password": "plaintext-legacy" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Invalid email or password");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn inactive_employee_cannot_log_in() {
    let app = app();
    let mut new = common::new_employee("EMP011", "off@qore.test");
    new.is_active = false;
    app.store.insert_employee(new).await.unwrap();

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "off@qore.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json["message"],
        "Account is inactive. Please contact administrator."
    );
}

#[tokio::test]
async fn login_validates_input() {
    let app = app();
    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    let fields: Vec<&str> = json["error"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["email", "password"]);
}

#[tokio::test]
async fn malformed_json_is_a_400_envelope() {
    let app = app();
    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/employee-auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let resp = tower::ServiceExt::oneshot(app.router.clone(), req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn refresh_rotates_and_old_token_is_single_use() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (_, old) = app.login("ada@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/refresh-token",
            None,
            Some(json!({ "refreshToken": old })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    let new = json["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new, old);
    assert!(json["data"]["token"].is_string());

    let old_row = app.store.find_refresh_token(&old).await.unwrap().unwrap();
    assert!(old_row.is_revoked);
    assert_eq!(old_row.replaced_by_token.as_deref(), Some(new.as_str()));
    let new_row = app.store.find_refresh_token(&new).await.unwrap().unwrap();
    assert!(!new_row.is_revoked);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/refresh-token",
            None,
            Some(json!({ "refreshToken": old })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Invalid refresh token");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_have_one_winner() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (_, token) = app.login("ada@qore.test", PASSWORD).await;
    let app = std::sync::Arc::new(app);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            app.send(
                Method::POST,
                "/api/employee-auth/refresh-token",
                None,
                Some(json!({ "refreshToken": token })),
            )
            .await
            .0
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            status => assert_eq!(status, StatusCode::UNAUTHORIZED),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn expired_refresh_token_is_rejected_and_revoked() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (_, token) = app.login("ada@qore.test", PASSWORD).await;
    assert!(
        app.store
            .set_refresh_token_expiry(&token, Utc::now() - Duration::seconds(1))
            .await
    );

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/refresh-token",
            None,
            Some(json!({ "refreshToken": token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Refresh token expired");

    let row = app.store.find_refresh_token(&token).await.unwrap().unwrap();
    assert!(row.is_revoked);
    assert!(row.replaced_by_token.is_none());
}

#[tokio::test]
async fn refresh_for_deactivated_employee_fails() {
    let app = app();
    let employee = app.employee("EMP010", "ada@qore.test").await;
    let (_, token) = app.login("ada@qore.test", PASSWORD).await;
    app.store
        .soft_delete_employee(employee.id, None)
        .await
        .unwrap();

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/refresh-token",
            None,
            Some(json!({ "refreshToken": token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Employee not found or inactive");
}

#[tokio::test]
async fn forged_refresh_token_is_rejected() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/employee-auth/refresh-token",
            None,
            Some(json!({ "refreshToken": "not.a.token" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_always_succeeds() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (_, token) = app.login("ada@qore.test", PASSWORD).await;

    for body in [
        None,
        Some(json!({})),
        Some(json!({ "refreshToken": "unknown" })),
        Some(json!({ "refreshToken": token })),
        Some(json!({ "refreshToken": token })),
    ] {
        let (status, json) = app
            .send(Method::POST, "/api/employee-auth/logout", None, body)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "success": true, "message": "Logout successful" }));
    }

    let row = app.store.find_refresh_token(&token).await.unwrap().unwrap();
    assert!(row.is_revoked);
}

#[tokio::test]
async fn status_requires_a_bearer_token() {
    let app = app();
    let employee = app.employee("EMP010", "ada@qore.test").await;

    let (status, json) = app
        .send(Method::GET, "/api/employee-auth/status", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = app
        .send(Method::GET, "/api/employee-auth/status", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (access, _) = app.login("ada@qore.test", PASSWORD).await;
    let (status, json) = app
        .send(Method::GET, "/api/employee-auth/status", Some(&access), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["employee"]["id"], employee.id);
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = app();
    let employee = app.employee("EMP010", "ada@qore.test").await;
    let (access, _) = app.login("ada@qore.test", PASSWORD).await;
    app.login("ada@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/logout-all",
            Some(&access),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["revoked"], 2);

    let rows = app
        .store
        .list_refresh_tokens_for_employee(employee.id)
        .await
        .unwrap();
    assert!(rows.iter().all(|r| r.is_revoked));
}

#[tokio::test]
async fn change_password_revokes_sessions_and_swaps_credentials() {
    let app = app();
    app.employee("EMP010", "ada@qore.test").await;
    let (access, refresh) = app.login("ada@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employee-auth/change-password",
            Some(&access),
            Some(json!({ "currentPassword": "wrong-one", "newPassword": "brand-new" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Current password is incorrect");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/employee-auth/change-password",
            Some(&access),
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "brand-new" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let row = app.store.find_refresh_token(&refresh).await.unwrap().unwrap();
    assert!(row.is_revoked);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/employee-auth/login",
            None,
            Some(json!({ "email": "ada@qore.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login("ada@qore.test", "brand-new").await;
}
