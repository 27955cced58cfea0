use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::Project;
use crate::report_gen::{RenderedReport, accounting_markdown, project_markdown, supervisory_markdown};
use crate::reports::{ReportPeriod, build_accounting_report, build_supervisory_report, summarize_by_user};

use super::{ApiQuery, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pdf", get(project_pdf))
        .route("/xlsx", get(project_xlsx))
        .route("/accounting", get(accounting_report))
        .route("/supervisory", get(supervisory_report))
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub project_id: Option<i32>,
    pub funding_source_id: Option<i32>,
    pub user_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub format: ReportFormat,
}

impl ExportQuery {
    fn period(&self) -> ReportPeriod {
        ReportPeriod::new(self.start_date, self.end_date)
    }
}

fn required_project_id(query: &ExportQuery) -> AppResult<i32> {
    query
        .project_id
        .ok_or_else(|| AppError::validation("Project ID is required"))
}

async fn load_project(state: &AppState, id: i32) -> AppResult<Project> {
    state
        .db
        .get_project(id)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

fn attachment(report: RenderedReport) -> Response {
    (
        [
            (header::CONTENT_TYPE, report.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name),
            ),
        ],
        report.bytes,
    )
        .into_response()
}

async fn project_pdf(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let project_id = required_project_id(&query)?;
    let project = load_project(&state, project_id).await?;

    let rows = state
        .db
        .export_rows(project_id, query.funding_source_id, query.start_date, query.end_date)
        .await?;
    let markdown = project_markdown(&project, &query.period(), &summarize_by_user(&rows), Utc::now());
    let report = state
        .reports
        .render_pdf(&format!("project-{project_id}-export"), &markdown)
        .await?;

    Ok(attachment(report))
}

async fn project_xlsx(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let project_id = required_project_id(&query)?;
    let project = load_project(&state, project_id).await?;

    let rows = state
        .db
        .export_rows(project_id, query.funding_source_id, query.start_date, query.end_date)
        .await?;
    let report = state.reports.render_project_xlsx(
        &format!("project-{project_id}-export"),
        &project,
        &query.period(),
        &rows,
        Utc::now(),
    )?;

    Ok(attachment(report))
}

async fn accounting_report(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let (Some(project_id), Some(funding_source_id)) = (query.project_id, query.funding_source_id) else {
        return Err(AppError::validation("Project ID and Funding Source ID are required"));
    };

    let project = load_project(&state, project_id).await?;
    if state.db.get_funding_source(funding_source_id).await?.is_none() {
        return Err(AppError::not_found("Funding source not found"));
    }
    let funding = state
        .db
        .find_project_funding(project_id, funding_source_id)
        .await?
        .ok_or_else(|| AppError::not_found("This funding source is not associated with the project"))?;

    let rows = state
        .db
        .accounting_rows(project_id, funding_source_id, query.start_date, query.end_date)
        .await?;
    let report = build_accounting_report(&project, &funding, query.period(), rows);

    match query.format {
        ReportFormat::Json => Ok(Json(report).into_response()),
        ReportFormat::Pdf => {
            let rendered = state
                .reports
                .render_pdf(
                    &format!("accounting-report-{project_id}-{funding_source_id}"),
                    &accounting_markdown(&report),
                )
                .await?;
            Ok(attachment(rendered))
        }
    }
}

async fn supervisory_report(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let project_id = required_project_id(&query)?;
    let project = load_project(&state, project_id).await?;

    let rows = state
        .db
        .supervisory_rows(project_id, query.user_id, query.start_date, query.end_date)
        .await?;
    let assignments = state.db.project_assignments(project_id, query.user_id).await?;
    let report = build_supervisory_report(&project, query.period(), rows, &assignments);

    match query.format {
        ReportFormat::Json => Ok(Json(report).into_response()),
        ReportFormat::Pdf => {
            let stem = match query.user_id {
                Some(user_id) => format!("dlut-report-{project_id}-user-{user_id}"),
                None => format!("dlut-report-{project_id}"),
            };
            let rendered = state.reports.render_pdf(&stem, &supervisory_markdown(&report)).await?;
            Ok(attachment(rendered))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> ExportQuery {
        let uri: axum::http::Uri = format!("/api/exports/pdf?{query}").parse().unwrap();
        axum::extract::Query::<ExportQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn query_uses_camel_case_names() {
        let query = parse("projectId=3&fundingSourceId=4&startDate=2024-01-01&format=pdf");
        assert_eq!(query.project_id, Some(3));
        assert_eq!(query.funding_source_id, Some(4));
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.format, ReportFormat::Pdf);
    }

    #[test]
    fn format_defaults_to_json() {
        let query = parse("projectId=3");
        assert_eq!(query.format, ReportFormat::Json);
        assert!(query.period().is_all_time());
    }

    #[test]
    fn missing_project_is_a_bad_request() {
        let err = required_project_id(&ExportQuery::default()).unwrap_err();
        assert_eq!(err.to_string(), "Project ID is required");
    }

    #[test]
    fn attachments_carry_a_file_name() {
        let response = attachment(RenderedReport {
            file_name: "project-1-export.pdf".into(),
            content_type: mime::APPLICATION_PDF,
            bytes: b"%PDF-1.5".to_vec(),
        });
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"project-1-export.pdf\""
        );
    }
}
