//! Report assembly.
//!
//! The database hands over flat, ordered rows; the builders here group them
//! into the nested shapes served as JSON and rendered to documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{Project, ProjectAssignment, ProjectFunding, round_hours};

const ALL_TIME: &str = "All time";

/// Reporting window as shown to readers.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportPeriod {
    pub start_date: String,
    pub end_date: String,
}

impl ReportPeriod {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let show = |date: Option<NaiveDate>| date.map_or_else(|| ALL_TIME.to_string(), |d| d.to_string());
        Self {
            start_date: show(start),
            end_date: show(end),
        }
    }

    pub fn is_all_time(&self) -> bool {
        self.start_date == ALL_TIME && self.end_date == ALL_TIME
    }
}

/// A funded slice of a time entry, as read for the accounting report.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct AccountingRow {
    pub id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
    pub entry_type: String,
    pub user_id: i32,
    pub full_name: String,
    pub username: String,
    pub percentage: f64,
    pub funded_hours: f64,
}

impl AccountingRow {
    fn user_name(&self) -> &str {
        display_name(&self.full_name, &self.username)
    }
}

/// A time entry with its author and a readable funding summary.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct SupervisoryRow {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
    pub entry_type: String,
    pub created_at: DateTime<Utc>,
    pub full_name: String,
    pub username: String,
    pub email: String,
    /// e.g. `EU Grant: 60%, Internal: 40%`
    pub funding_distribution: String,
}

/// One entry in a project export; `hours` is the funded share when the
/// export is limited to one funding source.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ExportEntryRow {
    pub id: i32,
    pub date: NaiveDate,
    pub user_id: i32,
    pub user_name: String,
    pub entry_type: String,
    pub description: Option<String>,
    pub hours: f64,
}

fn display_name<'a>(full_name: &'a str, username: &'a str) -> &'a str {
    if full_name.trim().is_empty() { username } else { full_name }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportProject {
    pub id: i32,
    pub name: String,
    pub contract_number: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReportFundingSource {
    pub id: i32,
    pub name: String,
    pub allocation: f64,
    pub percentage: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct UserMonthEntries {
    pub user_id: i32,
    pub user_name: String,
    pub entries: Vec<AccountingRow>,
    pub total: f64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: String,
    pub user_entries: Vec<UserMonthEntries>,
    pub total: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserTotal {
    pub user_id: i32,
    pub user_name: String,
    pub total: f64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountingReport {
    pub project: ReportProject,
    pub funding_source: ReportFundingSource,
    pub period: ReportPeriod,
    pub monthly_reports: Vec<MonthlyReport>,
    pub user_totals: Vec<UserTotal>,
    pub grand_total: f64,
}

/// Group funded rows by month, then by user, totalling funded hours at
/// every level. Rows are expected in date order.
pub fn build_accounting_report(
    project: &Project,
    funding: &ProjectFunding,
    period: ReportPeriod,
    rows: Vec<AccountingRow>,
) -> AccountingReport {
    let mut months: Vec<MonthlyReport> = Vec::new();
    let mut user_totals: Vec<UserTotal> = Vec::new();
    let mut grand_total = 0.0;

    for row in rows {
        let month_key = row.date.format("%Y-%m").to_string();
        let funded = row.funded_hours;

        let month_idx = match months.iter().position(|m| m.month == month_key) {
            Some(idx) => idx,
            None => {
                months.push(MonthlyReport {
                    month: month_key,
                    user_entries: Vec::new(),
                    total: 0.0,
                });
                months.len() - 1
            }
        };
        let month = &mut months[month_idx];

        let user_idx = match month.user_entries.iter().position(|u| u.user_id == row.user_id) {
            Some(idx) => idx,
            None => {
                month.user_entries.push(UserMonthEntries {
                    user_id: row.user_id,
                    user_name: row.user_name().to_string(),
                    entries: Vec::new(),
                    total: 0.0,
                });
                month.user_entries.len() - 1
            }
        };

        match user_totals.iter_mut().find(|u| u.user_id == row.user_id) {
            Some(total) => total.total += funded,
            None => user_totals.push(UserTotal {
                user_id: row.user_id,
                user_name: row.user_name().to_string(),
                total: funded,
            }),
        }

        let user = &mut month.user_entries[user_idx];
        user.total += funded;
        user.entries.push(row);
        month.total += funded;
        grand_total += funded;
    }

    for month in &mut months {
        month.total = round_hours(month.total);
        for user in &mut month.user_entries {
            user.total = round_hours(user.total);
        }
    }
    for total in &mut user_totals {
        total.total = round_hours(total.total);
    }

    AccountingReport {
        project: ReportProject {
            id: project.id,
            name: project.name.clone(),
            contract_number: project.contract_number.clone(),
        },
        funding_source: ReportFundingSource {
            id: funding.funding_source_id,
            name: funding.name.clone(),
            allocation: funding.amount,
            percentage: funding.percentage,
        },
        period,
        monthly_reports: months,
        user_totals,
        grand_total: round_hours(grand_total),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SupervisedProject {
    pub id: i32,
    pub name: String,
    pub contract_number: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SupervisedUser {
    pub user_id: i32,
    pub user_name: String,
    pub email: String,
    pub entries: Vec<SupervisoryRow>,
    pub total_hours: f64,
    pub workload: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct SupervisoryReport {
    pub project: SupervisedProject,
    pub period: ReportPeriod,
    pub users: Vec<SupervisedUser>,
}

/// Group entries by user with each user's total and project workload.
pub fn build_supervisory_report(
    project: &Project,
    period: ReportPeriod,
    rows: Vec<SupervisoryRow>,
    assignments: &[ProjectAssignment],
) -> SupervisoryReport {
    let mut users: Vec<SupervisedUser> = Vec::new();

    for row in rows {
        let idx = match users.iter().position(|u| u.user_id == row.user_id) {
            Some(idx) => idx,
            None => {
                let workload = assignments
                    .iter()
                    .find(|a| a.user_id == row.user_id)
                    .map_or(0.0, |a| a.workload);
                users.push(SupervisedUser {
                    user_id: row.user_id,
                    user_name: display_name(&row.full_name, &row.username).to_string(),
                    email: row.email.clone(),
                    entries: Vec::new(),
                    total_hours: 0.0,
                    workload,
                });
                users.len() - 1
            }
        };
        let user = &mut users[idx];
        user.total_hours += row.hours;
        user.entries.push(row);
    }

    for user in &mut users {
        user.total_hours = round_hours(user.total_hours);
    }

    SupervisoryReport {
        project: SupervisedProject {
            id: project.id,
            name: project.name.clone(),
            contract_number: project.contract_number.clone(),
            start_date: project.start_date,
            end_date: project.end_date,
        },
        period,
        users,
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserHours {
    pub user_id: i32,
    pub user_name: String,
    pub hours: f64,
}

/// Hours per user in first-seen order.
pub fn summarize_by_user(rows: &[ExportEntryRow]) -> Vec<UserHours> {
    let mut summary: Vec<UserHours> = Vec::new();
    for row in rows {
        match summary.iter_mut().find(|u| u.user_id == row.user_id) {
            Some(user) => user.hours += row.hours,
            None => summary.push(UserHours {
                user_id: row.user_id,
                user_name: row.user_name.clone(),
                hours: row.hours,
            }),
        }
    }
    for user in &mut summary {
        user.hours = round_hours(user.hours);
    }
    summary
}
