//! Shared helpers: an in-memory router and a JSON request shortcut.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use qore_api::config::ApiConfig;
use qore_api::{AppState, router};
use qore_core::auth::password::hash_password;
use qore_core::models::{Employee, NewEmployee, NewRole, Role};
use qore_core::store::{EmployeeStore, MemoryStore, RoleStore, Store};
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub config: ApiConfig,
    pub router: Router,
}

pub fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let config = ApiConfig::for_tests();
    let state = AppState::new(store.clone() as Arc<dyn Store>, config.clone());
    TestApp {
        store,
        config,
        router: router(state),
    }
}

pub fn new_employee(code: &str, email: &str) -> NewEmployee {
    NewEmployee {
        employee_id: code.into(),
        first_name: code.into(),
        last_name: "Tester".into(),
        email: email.into(),
        password_hash: hash_password(PASSWORD, 4).unwrap(),
        phone: None,
        branch_id: None,
        department_id: None,
        designation_id: None,
        reporting_to: None,
        is_active: true,
        is_superadmin: false,
        created_by: None,
    }
}

impl TestApp {
    pub async fn employee(&self, code: &str, email: &str) -> Employee {
        self.store
            .insert_employee(new_employee(code, email))
            .await
            .unwrap()
    }

    pub async fn admin(&self) -> Employee {
        let mut new = new_employee("EMP001", "admin@qore.test");
        new.is_superadmin = true;
        self.store.insert_employee(new).await.unwrap()
    }

    pub async fn system_role(&self, slug: &str) -> Role {
        self.store
            .insert_role(NewRole {
                name: slug.into(),
                slug: slug.into(),
                description: None,
                is_system: true,
                is_active: true,
                created_by: None,
            })
            .await
            .unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    /// Log in and return `(access token, refresh token)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, json) = self
            .send(
                Method::POST,
                "/api/employee-auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {json}");
        (
            json["data"]["token"].as_str().unwrap().to_string(),
            json["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
