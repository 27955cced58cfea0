use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::Action;
use crate::error::{AppError, AppResult};
use crate::models::{DepartmentListQuery, DepartmentPayload, DepartmentWithUsers};

use super::{ApiJson, ApiPath, ApiQuery, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_departments).post(create_department))
        .route(
            "/:id",
            get(get_department).put(update_department).delete(delete_department),
        )
}

fn validate_payload(payload: &DepartmentPayload) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Department name is required"));
    }
    Ok(())
}

async fn list_departments(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<DepartmentListQuery>,
) -> AppResult<Json<Vec<DepartmentWithUsers>>> {
    let departments = state.db.list_departments(&query).await?;
    let ids: Vec<i32> = departments.iter().map(|d| d.id).collect();
    let mut members = state.db.members_by_department(&ids).await?;

    Ok(Json(
        departments
            .into_iter()
            .map(|department| DepartmentWithUsers {
                users: members.remove(&department.id).unwrap_or_default(),
                department,
            })
            .collect(),
    ))
}

async fn get_department(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<DepartmentWithUsers>> {
    let department = state
        .db
        .get_department(id)
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))?;
    let users = state.db.members_by_department(&[id]).await?.remove(&id).unwrap_or_default();

    Ok(Json(DepartmentWithUsers { department, users }))
}

async fn create_department(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<DepartmentPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::ManageDepartments)?;
    validate_payload(&payload)?;

    let department_id = state.db.create_department(&payload).await?;
    info!(department_id, "department created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Department created successfully", "departmentId": department_id })),
    ))
}

async fn update_department(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<DepartmentPayload>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageDepartments)?;
    validate_payload(&payload)?;

    if !state.db.update_department(id, &payload).await? {
        return Err(AppError::not_found("Department not found"));
    }

    Ok(Json(json!({ "message": "Department updated successfully" })))
}

async fn delete_department(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::DeleteDepartments)?;

    if !state.db.delete_department(id).await? {
        return Err(AppError::not_found("Department not found"));
    }
    info!(department_id = id, "department deleted");

    Ok(Json(json!({ "message": "Department deleted successfully" })))
}
