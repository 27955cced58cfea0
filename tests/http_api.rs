//! Request-level checks that resolve before any query runs.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;

use common::{TestApp, message};
use timesheet_manager::auth::Role;

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::offline();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::offline();
    let (status, body) = app.call(Method::GET, "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Access denied");
}

#[tokio::test]
async fn garbage_token_is_forbidden() {
    let app = TestApp::offline();
    let (status, body) = app
        .call(Method::GET, "/api/projects", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message(&body), "Invalid token");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_forbidden() {
    let app = TestApp::offline();
    let foreign = timesheet_manager::auth::TokenService::new("some-other-secret", 1)
        .issue(1, "admin", Role::Admin)
        .expect("token");
    let (status, _) = app
        .call(Method::GET, "/api/users", Some(&foreign), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn register_requires_credentials() {
    let app = TestApp::offline();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ana", "password": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Username and password are required");
}

#[tokio::test]
async fn employees_cannot_read_other_users_entries() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let (status, body) = app
        .call(Method::GET, "/api/time-entries/user/99", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message(&body), "Not authorized to view this user's time entries");
}

#[tokio::test]
async fn employees_cannot_log_time_for_others() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let (status, body) = app
        .call(
            Method::POST,
            "/api/time-entries",
            Some(&token),
            Some(json!({ "user_id": 8, "project_id": 1, "date": "2024-03-04", "hours": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message(&body), "Not authorized to create time entries for other users");
}

#[tokio::test]
async fn hours_outside_a_day_are_rejected() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    for hours in [30.0, 0.0, -2.0] {
        let (status, _) = app
            .call(
                Method::POST,
                "/api/time-entries",
                Some(&token),
                Some(json!({ "project_id": 1, "date": "2024-03-04", "hours": hours })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "hours {hours}");
    }
}

#[tokio::test]
async fn explicit_entry_split_must_total_one_hundred() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let (status, body) = app
        .call(
            Method::POST,
            "/api/time-entries",
            Some(&token),
            Some(json!({
                "project_id": 1,
                "date": "2024-03-04",
                "hours": 8,
                "funding_distribution": [
                    { "funding_source_id": 1, "percentage": 50 },
                    { "funding_source_id": 2, "percentage": 40 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message(&body).contains("add up to 100"), "{body}");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/time-entries")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"project_id\": 1,"))
        .expect("request");
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!message(&body).is_empty());
}

#[tokio::test]
async fn funding_source_writes_need_a_manager() {
    let app = TestApp::offline();
    let employee = app.token(7, Role::Employee);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/funding-sources",
            Some(&employee),
            Some(json!({ "name": "ERDF" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let manager = app.token(2, Role::ProjectManager);
    let (status, body) = app
        .call(
            Method::POST,
            "/api/funding-sources",
            Some(&manager),
            Some(json!({ "name": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Name is required");
}

#[tokio::test]
async fn project_funding_must_total_one_hundred() {
    let app = TestApp::offline();
    let token = app.token(2, Role::ProjectManager);
    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({
                "name": "Bridge monitoring",
                "funding_sources": [
                    { "funding_source_id": 1, "amount": 1000, "percentage": 60 },
                    { "funding_source_id": 2, "amount": 500, "percentage": 30 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message(&body).contains("add up to 100"), "{body}");
}

#[tokio::test]
async fn numbers_beyond_column_range_are_bad_requests() {
    let app = TestApp::offline();
    let token = app.token(2, Role::ProjectManager);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects/1/users",
            Some(&token),
            Some(json!({ "userId": 5, "workload": 100000 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message(&body).starts_with("Workload must be between 0 and"), "{body}");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({ "name": "Q", "budget": 1e12 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(message(&body).starts_with("Budget must be between 0 and"), "{body}");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/projects/1/funding",
            Some(&token),
            Some(json!({
                "funding_distributions": [
                    { "funding_source_id": 1, "amount": 1e9, "percentage": 100 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn employees_cannot_create_projects() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let (status, _) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({ "name": "Side project" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn only_privileged_roles_update_other_users() {
    let app = TestApp::offline();
    let token = app.token(7, Role::Employee);
    let (status, body) = app
        .call(
            Method::PUT,
            "/api/users/8",
            Some(&token),
            Some(json!({ "full_name": "Someone Else" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message(&body), "Not authorized to update other users");

    let (status, body) = app
        .call(Method::PUT, "/api/users/7", Some(&token), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(message(&body), "Not authorized to change roles");
}

#[tokio::test]
async fn project_managers_cannot_delete_departments() {
    let app = TestApp::offline();
    let token = app.token(2, Role::ProjectManager);
    let (status, _) = app
        .call(Method::DELETE, "/api/departments/3", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn funding_source_month_filter_is_validated() {
    let app = TestApp::offline();
    let token = app.token(1, Role::Admin);
    let (status, body) = app
        .call(
            Method::GET,
            "/api/time-entries/funding-source/1?month=2024-13",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Month must be in YYYY-MM format");
}

#[tokio::test]
async fn exports_require_their_identifiers() {
    let app = TestApp::offline();
    let token = app.token(1, Role::Admin);

    for uri in ["/api/exports/pdf", "/api/exports/xlsx", "/api/exports/supervisory"] {
        let (status, body) = app.call(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(message(&body), "Project ID is required");
    }

    let (status, body) = app
        .call(Method::GET, "/api/exports/accounting?projectId=1", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Project ID and Funding Source ID are required");
}

#[tokio::test]
async fn non_numeric_path_ids_are_rejected() {
    let app = TestApp::offline();
    let token = app.token(1, Role::Admin);
    let (status, _) = app
        .call(Method::GET, "/api/projects/abc", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = TestApp::offline();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/projects")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .expect("request");

    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
