//! Role management and the single-primary assignment rule over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, app};
use serde_json::json;

#[tokio::test]
async fn system_role_cannot_be_deleted() {
    let app = app();
    app.admin().await;
    let role = app.system_role("super-admin").await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;
    let uri = format!("/api/roles/{}", role.id);

    let (status, json) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "System roles cannot be deleted");

    let (status, json) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["slug"], "super-admin");
    assert_eq!(json["data"]["is_system"], true);
}

#[tokio::test]
async fn system_role_cannot_be_renamed_but_can_be_described() {
    let app = app();
    app.admin().await;
    let role = app.system_role("employee").await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;
    let uri = format!("/api/roles/{}", role.id);

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&token), Some(json!({ "name": "Staff" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "description": "Everyone" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["description"], "Everyone");
    assert_eq!(json["data"]["name"], "employee");
}

#[tokio::test]
async fn custom_role_lifecycle() {
    let app = app();
    app.admin().await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/roles",
            Some(&token),
            Some(json!({ "name": "HR Manager" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["data"]["slug"], "hr-manager");
    assert_eq!(json["data"]["is_system"], false);
    let id = json["data"]["id"].as_i64().unwrap();

    let (status, json) = app
        .send(
            Method::POST,
            "/api/roles",
            Some(&token),
            Some(json!({ "name": "Another", "slug": "hr-manager" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Role with this slug already exists");

    let uri = format!("/api/roles/{id}");
    let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The slug is free again once the holder is soft-deleted.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/roles",
            Some(&token),
            Some(json!({ "name": "HR Manager" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn role_mutations_need_a_superadmin() {
    let app = app();
    app.employee("EMP020", "staff@qore.test").await;
    let role = app.system_role("employee").await;
    let (token, _) = app.login("staff@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/roles",
            Some(&token),
            Some(json!({ "name": "Sneaky" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["message"], "Superadmin access required");

    let (status, json) = app.send(Method::GET, "/api/roles", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["items"][0]["id"], role.id);
    assert_eq!(json["data"]["pagination"]["total"], 1);
    assert_eq!(json["data"]["pagination"]["totalPages"], 1);
}

#[tokio::test]
async fn employee_keeps_exactly_one_primary_role() {
    let app = app();
    app.admin().await;
    let employee = app.employee("EMP030", "bo@qore.test").await;
    let first = app.system_role("employee").await;
    let second = app.system_role("team-lead").await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;
    let uri = format!("/api/employees/{}/roles", employee.id);

    let (status, a) = app
        .send(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "role_id": first.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["data"]["is_primary"], true, "first assignment is primary");

    let (status, b) = app
        .send(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "role_id": second.id, "is_primary": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let primaries = |json: &serde_json::Value| -> Vec<i64> {
        json["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|r| r["is_primary"] == true)
            .map(|r| r["id"].as_i64().unwrap())
            .collect()
    };

    let (_, list) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(primaries(&list), [b["data"]["id"].as_i64().unwrap()]);

    let a_id = a["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("{uri}/{a_id}/primary"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(primaries(&list), [a_id]);

    let (status, json) = app
        .send(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({ "role_id": first.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Role is already assigned to this employee");

    // Removing the primary hands the flag to the remaining assignment.
    let (status, _) = app
        .send(Method::DELETE, &format!("{uri}/{a_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(primaries(&list), [b["data"]["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn assigning_to_missing_employee_or_role_is_404() {
    let app = app();
    app.admin().await;
    let role = app.system_role("employee").await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;

    let (status, json) = app
        .send(
            Method::POST,
            "/api/employees/999/roles",
            Some(&token),
            Some(json!({ "role_id": role.id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Employee not found");

    let employee = app.employee("EMP031", "cy@qore.test").await;
    let (status, json) = app
        .send(
            Method::POST,
            &format!("/api/employees/{}/roles", employee.id),
            Some(&token),
            Some(json!({ "role_id": 999 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Role not found");
}

#[tokio::test]
async fn malformed_path_ids_get_the_envelope() {
    let app = app();
    app.admin().await;
    let (token, _) = app.login("admin@qore.test", PASSWORD).await;

    for uri in [
        "/api/roles/abc",
        "/api/employees/1/roles/xyz/primary",
    ] {
        let method = if uri.ends_with("primary") {
            Method::PUT
        } else {
            Method::GET
        };
        let (status, json) = app.send(method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["success"], false, "{uri}");
        assert!(json["message"].is_string(), "{uri}");
    }
}
