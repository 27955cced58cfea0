use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::funding::FundingShare;

/// Longest time entry accepted for a single day.
pub const MAX_ENTRY_HOURS: f64 = 24.0;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    Work,
    Vacation,
    SickLeave,
    Holiday,
    Other,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Work => "work",
            EntryType::Vacation => "vacation",
            EntryType::SickLeave => "sick_leave",
            EntryType::Holiday => "holiday",
            EntryType::Other => "other",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(EntryType::Work),
            "vacation" => Ok(EntryType::Vacation),
            "sick_leave" => Ok(EntryType::SickLeave),
            "holiday" => Ok(EntryType::Holiday),
            "other" => Ok(EntryType::Other),
            other => Err(format!("unknown entry type: {other}")),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct TimeEntry {
    pub id: i32,
    pub user_id: i32,
    pub project_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
    pub entry_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry listed under a user, with the project name and funding source names.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct UserTimeEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub project_name: Option<String>,
    pub funding_sources: Vec<String>,
}

/// Entry listed under a project, with the author and funding source names.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ProjectTimeEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub user_name: Option<String>,
    pub username: Option<String>,
    pub funding_sources: Vec<String>,
}

/// One funded slice of an entry, listed under a funding source.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct FundingSourceTimeEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub user_name: String,
    pub username: String,
    pub project_name: String,
    pub percentage: f64,
    pub funding_hours: f64,
    pub funding_source_name: String,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct TimeEntryFunding {
    pub funding_source_id: i32,
    pub percentage: f64,
    pub hours: f64,
    pub name: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct TimeEntryDetail {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub project_name: Option<String>,
    pub funding_distribution: Vec<TimeEntryFunding>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateTimeEntryRequest {
    /// Defaults to the caller.
    pub user_id: Option<i32>,
    pub project_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
    pub entry_type: Option<EntryType>,
    pub funding_distribution: Option<Vec<FundingShare>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateTimeEntryRequest {
    pub hours: Option<f64>,
    pub description: Option<String>,
    pub entry_type: Option<EntryType>,
    pub funding_distribution: Option<Vec<FundingShare>>,
}

/// Validated values for a new entry row.
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub user_id: i32,
    pub project_id: i32,
    pub date: NaiveDate,
    pub hours: f64,
    pub description: Option<String>,
    pub entry_type: EntryType,
}

/// Reject non-positive or over-long hour values.
pub fn validate_hours(hours: f64) -> Result<(), String> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_ENTRY_HOURS {
        return Err(format!("Hours must be greater than 0 and at most {MAX_ENTRY_HOURS}"));
    }
    Ok(())
}

/// Round to the two decimals the hours columns keep.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

#[derive(Deserialize, Debug, Default)]
pub struct FundingSourceEntriesQuery {
    /// `YYYY-MM`
    pub month: Option<String>,
}

/// Parse a `YYYY-MM` month into its first and last day.
pub fn month_bounds(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, mon) = month.split_once('-')?;
    if year.len() != 4 || mon.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let mon: u32 = mon.parse().ok()?;
    let first = NaiveDate::from_ymd_opt(year, mon, 1)?;
    let next = if mon == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, mon + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_types_match_stored_values() {
        for t in [
            EntryType::Work,
            EntryType::Vacation,
            EntryType::SickLeave,
            EntryType::Holiday,
            EntryType::Other,
        ] {
            assert_eq!(t.as_str().parse::<EntryType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
        assert!("overtime".parse::<EntryType>().is_err());
    }

    #[test]
    fn hours_bounds() {
        assert!(validate_hours(0.25).is_ok());
        assert!(validate_hours(24.0).is_ok());
        assert!(validate_hours(0.0).is_err());
        assert!(validate_hours(-1.0).is_err());
        assert!(validate_hours(24.5).is_err());
        assert!(validate_hours(f64::NAN).is_err());
        assert_eq!(round_hours(7.456), 7.46);
    }

    #[test]
    fn month_bounds_cover_the_whole_month() {
        let (first, last) = month_bounds("2024-02").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let (_, december_end) = month_bounds("2023-12").unwrap();
        assert_eq!(december_end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn malformed_months_are_rejected() {
        assert!(month_bounds("2024-13").is_none());
        assert!(month_bounds("2024-1").is_none());
        assert!(month_bounds("24-01").is_none());
        assert!(month_bounds("2024-01'; DROP TABLE users; --").is_none());
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateTimeEntryRequest = serde_json::from_value(serde_json::json!({
            "project_id": 3,
            "date": "2024-03-04",
            "hours": 7.5
        }))
        .unwrap();
        assert_eq!(req.user_id, None);
        assert_eq!(req.entry_type.unwrap_or_default(), EntryType::Work);
        assert!(req.funding_distribution.is_none());
    }
}
