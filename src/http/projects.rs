use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::Action;
use crate::error::{AppError, AppResult};
use crate::funding::validate_project_shares;
use crate::models::{
    AssignUserRequest, MAX_BUDGET, MAX_WORKLOAD, ProjectFunding, ProjectFundingRequest, ProjectListQuery,
    ProjectPayload, ProjectUserInput, ProjectWithUsers, UpdateAssignmentRequest,
};

use super::{ApiJson, ApiPath, ApiQuery, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/:id", get(get_project).put(update_project).delete(delete_project))
        .route("/:id/users", put(replace_project_users).post(assign_user))
        .route("/:id/users/:user_id", put(update_assignment).delete(remove_assignment))
        .route("/:id/funding", get(get_project_funding).post(set_project_funding))
}

fn check_workload(workload: f64) -> AppResult<()> {
    if !(0.0..=MAX_WORKLOAD).contains(&workload) {
        return Err(AppError::validation(format!(
            "Workload must be between 0 and {MAX_WORKLOAD}"
        )));
    }
    Ok(())
}

fn check_members(users: &[ProjectUserInput]) -> AppResult<()> {
    users.iter().try_for_each(|u| check_workload(u.workload()))
}

fn validate_payload(payload: &ProjectPayload) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Project name is required"));
    }
    if payload.budget.is_some_and(|b| !(0.0..=MAX_BUDGET).contains(&b)) {
        return Err(AppError::validation(format!("Budget must be between 0 and {MAX_BUDGET}")));
    }
    if payload.min_workload.is_some_and(|w| !(0.0..=MAX_WORKLOAD).contains(&w)) {
        return Err(AppError::validation(format!(
            "Minimum workload must be between 0 and {MAX_WORKLOAD}"
        )));
    }
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if end < start {
            return Err(AppError::validation("End date must not be before start date"));
        }
    }
    if let Some(users) = &payload.users {
        check_members(users)?;
    }
    if let Some(shares) = &payload.funding_sources {
        validate_project_shares(shares)?;
    }
    Ok(())
}

async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ProjectListQuery>,
) -> AppResult<Json<Vec<ProjectWithUsers>>> {
    let member_id = user.role.is_employee().then_some(user.id);
    let projects = state.db.list_projects(&query, member_id).await?;

    let ids: Vec<i32> = projects.iter().map(|p| p.id).collect();
    let mut members = state.db.members_by_project(&ids).await?;

    let projects = projects
        .into_iter()
        .map(|project| ProjectWithUsers {
            users: members.remove(&project.id).unwrap_or_default(),
            project,
        })
        .collect();

    Ok(Json(projects))
}

async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<ProjectWithUsers>> {
    let project = state
        .db
        .get_project(id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    let users = state.db.project_members(id).await?;
    if user.role.is_employee() && !users.iter().any(|m| m.id == user.id) {
        return Err(AppError::forbidden("You do not have access to this project"));
    }

    Ok(Json(ProjectWithUsers { project, users }))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<ProjectPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::ManageProjects)?;
    validate_payload(&payload)?;

    let project_id = state.db.create_project(&payload, user.id).await?;
    info!(project_id, created_by = user.id, "project created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Project created successfully",
            "projectId": project_id,
            "name": payload.name,
            "description": payload.description,
            "start_date": payload.start_date,
            "end_date": payload.end_date,
            "budget": payload.budget.unwrap_or(0.0),
            "contract_number": payload.contract_number,
            "min_workload": payload.min_workload.unwrap_or(0.0),
        })),
    ))
}

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ProjectPayload>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageProjects)?;
    validate_payload(&payload)?;

    if !state.db.update_project(id, &payload).await? {
        return Err(AppError::not_found("Project not found"));
    }
    info!(project_id = id, "project updated");

    Ok(Json(json!({ "message": "Project updated successfully" })))
}

async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageProjects)?;

    if !state.db.delete_project(id).await? {
        return Err(AppError::not_found("Project not found"));
    }
    info!(project_id = id, "project deleted");

    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

async fn assign_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(project_id): ApiPath<i32>,
    ApiJson(req): ApiJson<AssignUserRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::ManageProjects)?;

    let workload = req.workload.unwrap_or(0.0);
    check_workload(workload)?;
    if state.db.get_project(project_id).await?.is_none() {
        return Err(AppError::not_found("Project not found"));
    }
    if !state.db.user_exists(req.user_id).await? {
        return Err(AppError::not_found("User not found"));
    }
    if state.db.is_assigned(project_id, req.user_id).await? {
        return Err(AppError::conflict("User already assigned to project"));
    }

    state
        .db
        .assign_user(project_id, req.user_id, req.role.unwrap_or_default(), workload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User assigned to project successfully" })),
    ))
}

async fn update_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((project_id, user_id)): ApiPath<(i32, i32)>,
    ApiJson(req): ApiJson<UpdateAssignmentRequest>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageProjects)?;

    if let Some(workload) = req.workload {
        check_workload(workload)?;
    }
    if !state.db.update_assignment(project_id, user_id, req.role, req.workload).await? {
        return Err(AppError::not_found("User not assigned to project"));
    }

    Ok(Json(json!({ "message": "Project user updated successfully" })))
}

async fn remove_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((project_id, user_id)): ApiPath<(i32, i32)>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageProjects)?;

    if !state.db.remove_assignment(project_id, user_id).await? {
        return Err(AppError::not_found("User not assigned to project"));
    }

    Ok(Json(json!({ "message": "User removed from project successfully" })))
}

/// The body must be a JSON array of members.
fn parse_member_list(body: Value) -> AppResult<Vec<ProjectUserInput>> {
    if !body.is_array() {
        return Err(AppError::validation("Users data should be an array"));
    }
    let users: Vec<ProjectUserInput> =
        serde_json::from_value(body).map_err(|err| AppError::validation(format!("Invalid users data: {err}")))?;
    check_members(&users)?;
    Ok(users)
}

async fn replace_project_users(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(project_id): ApiPath<i32>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ReplaceProjectUsers)?;
    let users = parse_member_list(body)?;

    if state.db.get_project(project_id).await?.is_none() {
        return Err(AppError::not_found("Project not found"));
    }
    state.db.replace_project_users(project_id, &users).await?;
    info!(project_id, members = users.len(), "project users replaced");

    Ok(Json(json!({ "message": "Project users updated successfully" })))
}

async fn get_project_funding(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(project_id): ApiPath<i32>,
) -> AppResult<Json<Vec<ProjectFunding>>> {
    Ok(Json(state.db.project_funding(project_id).await?))
}

async fn set_project_funding(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(project_id): ApiPath<i32>,
    ApiJson(req): ApiJson<ProjectFundingRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::ManageProjectFunding)?;

    let shares = match req.funding_distributions {
        Some(shares) if !shares.is_empty() => shares,
        _ => return Err(AppError::validation("Funding distributions are required")),
    };
    validate_project_shares(&shares)?;

    if state.db.get_project(project_id).await?.is_none() {
        return Err(AppError::not_found("Project not found"));
    }
    state.db.replace_project_funding(project_id, &shares).await?;
    info!(project_id, sources = shares.len(), "project funding replaced");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Project funding updated successfully" })),
    ))
}
