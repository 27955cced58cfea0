use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::Action;
use crate::error::{AppError, AppResult};
use crate::models::{FundedProject, FundingSource, FundingSourcePayload};

use super::{ApiJson, ApiPath, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_funding_sources).post(create_funding_source))
        .route(
            "/:id",
            get(get_funding_source)
                .put(update_funding_source)
                .delete(delete_funding_source),
        )
        .route("/:id/projects", get(funded_projects))
}

fn required_name(payload: &FundingSourcePayload) -> AppResult<&str> {
    payload.name().ok_or_else(|| AppError::validation("Name is required"))
}

async fn list_funding_sources(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<FundingSource>>> {
    Ok(Json(state.db.list_funding_sources().await?))
}

async fn create_funding_source(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<FundingSourcePayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::ManageFundingSources)?;
    let name = required_name(&payload)?;

    let source = state
        .db
        .create_funding_source(name, payload.description.as_deref())
        .await?;
    info!(funding_source_id = source.id, "funding source created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Funding source created successfully",
            "fundingSourceId": source.id,
        })),
    ))
}

async fn get_funding_source(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<FundingSource>> {
    let source = state
        .db
        .get_funding_source(id)
        .await?
        .ok_or_else(|| AppError::not_found("Funding source not found"))?;

    Ok(Json(source))
}

async fn update_funding_source(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<FundingSourcePayload>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageFundingSources)?;
    let name = required_name(&payload)?;

    state
        .db
        .update_funding_source(id, name, payload.description.as_deref())
        .await?
        .ok_or_else(|| AppError::not_found("Funding source not found"))?;

    Ok(Json(json!({ "message": "Funding source updated successfully" })))
}

async fn delete_funding_source(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::ManageFundingSources)?;

    if state.db.funding_source_project_count(id).await? > 0 {
        return Err(AppError::validation(
            "Cannot delete funding source because it is in use by one or more projects",
        ));
    }
    // Entries still funded by the source trip the foreign key, which maps to 400.
    if !state.db.delete_funding_source(id).await? {
        return Err(AppError::not_found("Funding source not found"));
    }
    info!(funding_source_id = id, "funding source deleted");

    Ok(Json(json!({ "message": "Funding source deleted successfully" })))
}

async fn funded_projects(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Vec<FundedProject>>> {
    Ok(Json(state.db.funded_projects(id).await?))
}
