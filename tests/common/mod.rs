#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

use timesheet_manager::auth::Role;
use timesheet_manager::config::Config;
use timesheet_manager::db::Database;
use timesheet_manager::http::{AppState, build_router};

pub const JWT_SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _exports: TempDir,
}

impl TestApp {
    pub fn new(pool: PgPool) -> Self {
        let exports = TempDir::new().expect("temp export dir");
        let config = Config::from_pairs([
            ("DATABASE_URL".to_string(), "postgres://localhost/unused".to_string()),
            ("JWT_SECRET".to_string(), JWT_SECRET.to_string()),
            ("BCRYPT_COST".to_string(), "4".to_string()),
            ("EXPORT_DIR".to_string(), exports.path().display().to_string()),
        ])
        .expect("test config");
        let state = AppState::new(Database::from_pool(pool), config).expect("app state");
        Self {
            router: build_router(state.clone()),
            state,
            _exports: exports,
        }
    }

    /// An app whose pool never connects; only requests rejected before
    /// touching the database are meaningful against it.
    pub fn offline() -> Self {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        Self::new(pool)
    }

    pub fn token(&self, id: i32, role: Role) -> String {
        self.state
            .tokens
            .issue(id, &format!("user{id}"), role)
            .expect("issue token")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(method, uri, token, body)).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request")
}

pub fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}
