use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::funding::{FundingShare, validate_entry_shares};
use crate::models::{
    CreateTimeEntryRequest, FundingSourceEntriesQuery, FundingSourceTimeEntry, NewTimeEntry, ProjectTimeEntry,
    TimeEntry, TimeEntryDetail, UpdateTimeEntryRequest, UserTimeEntry, month_bounds, round_hours, validate_hours,
};

use super::{ApiJson, ApiPath, ApiQuery, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_time_entry))
        .route("/user/:user_id", get(user_entries))
        .route("/project/:project_id", get(project_entries))
        .route("/funding-source/:funding_source_id", get(funding_source_entries))
        .route(
            "/:id",
            get(get_time_entry).put(update_time_entry).delete(delete_time_entry),
        )
}

fn checked_hours(hours: f64) -> AppResult<f64> {
    let hours = round_hours(hours);
    validate_hours(hours).map_err(AppError::validation)?;
    Ok(hours)
}

fn check_shares(shares: Option<&[FundingShare]>) -> AppResult<()> {
    if let Some(shares) = shares {
        validate_entry_shares(shares)?;
    }
    Ok(())
}

async fn user_entries(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(user_id): ApiPath<i32>,
) -> AppResult<Json<Vec<UserTimeEntry>>> {
    user.ensure_entry_access(user_id, "Not authorized to view this user's time entries")?;

    Ok(Json(state.db.entries_for_user(user_id).await?))
}

async fn project_entries(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(project_id): ApiPath<i32>,
) -> AppResult<Json<Vec<ProjectTimeEntry>>> {
    if user.role.is_employee() && !state.db.is_assigned(project_id, user.id).await? {
        return Err(AppError::forbidden("Not authorized to view this project's time entries"));
    }

    Ok(Json(state.db.entries_for_project(project_id).await?))
}

async fn funding_source_entries(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(funding_source_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<FundingSourceEntriesQuery>,
) -> AppResult<Json<Vec<FundingSourceTimeEntry>>> {
    let period = match query.month.as_deref().filter(|m| !m.is_empty()) {
        Some(month) => {
            Some(month_bounds(month).ok_or_else(|| AppError::validation("Month must be in YYYY-MM format"))?)
        }
        None => None,
    };

    Ok(Json(state.db.entries_for_funding_source(funding_source_id, period).await?))
}

async fn create_time_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTimeEntryRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let owner_id = req.user_id.unwrap_or(user.id);
    user.ensure_entry_access(owner_id, "Not authorized to create time entries for other users")?;

    let hours = checked_hours(req.hours)?;
    check_shares(req.funding_distribution.as_deref())?;

    let entry = NewTimeEntry {
        user_id: owner_id,
        project_id: req.project_id,
        date: req.date,
        hours,
        description: req.description,
        entry_type: req.entry_type.unwrap_or_default(),
    };
    let time_entry_id = state.db.create_time_entry(&entry, req.funding_distribution).await?;
    info!(time_entry_id, user_id = owner_id, project_id = entry.project_id, hours, "time entry created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Time entry created successfully", "timeEntryId": time_entry_id })),
    ))
}

async fn load_entry(state: &AppState, id: i32) -> AppResult<TimeEntry> {
    state
        .db
        .get_time_entry(id)
        .await?
        .ok_or_else(|| AppError::not_found("Time entry not found"))
}

async fn get_time_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<TimeEntryDetail>> {
    let detail = state
        .db
        .time_entry_detail(id)
        .await?
        .ok_or_else(|| AppError::not_found("Time entry not found"))?;
    user.ensure_entry_access(detail.entry.user_id, "Not authorized to access this time entry")?;

    Ok(Json(detail))
}

async fn update_time_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(mut req): ApiJson<UpdateTimeEntryRequest>,
) -> AppResult<Json<Value>> {
    let entry = load_entry(&state, id).await?;
    user.ensure_entry_access(entry.user_id, "Not authorized to update this time entry")?;

    if let Some(hours) = req.hours {
        req.hours = Some(checked_hours(hours)?);
    }
    check_shares(req.funding_distribution.as_deref())?;

    if !state.db.update_time_entry(id, &req).await? {
        return Err(AppError::not_found("Time entry not found"));
    }
    info!(time_entry_id = id, updated_by = user.id, "time entry updated");

    Ok(Json(json!({ "message": "Time entry updated successfully" })))
}

async fn delete_time_entry(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Value>> {
    let entry = load_entry(&state, id).await?;
    user.ensure_entry_access(entry.user_id, "Not authorized to delete this time entry")?;

    if !state.db.delete_time_entry(id).await? {
        return Err(AppError::not_found("Time entry not found"));
    }
    info!(time_entry_id = id, deleted_by = user.id, "time entry deleted");

    Ok(Json(json!({ "message": "Time entry deleted successfully" })))
}
