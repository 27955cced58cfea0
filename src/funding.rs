//! Funding distribution rules.
//!
//! A project spreads its budget over funding sources by percentage. Each
//! time entry carries its own split of hours across sources; when the
//! caller supplies none, the project's distribution is copied onto the
//! entry. Hours are stored with two decimals, so allocation works in
//! hundredths of an hour and hands out rounding remainders by the
//! largest-remainder method. With percentages summing to 100 the
//! allocated hours therefore sum to the entry's hours exactly.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Allowed drift when checking that percentages add up to 100.
pub const PERCENT_TOLERANCE: f64 = 0.01;

/// Largest amount the `NUMERIC(10, 2)` project funding column holds.
pub const MAX_FUNDING_AMOUNT: f64 = 99_999_999.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingShare {
    pub funding_source_id: i32,
    pub percentage: f64,
}

/// A project-level share: the percentage applied to time entries plus
/// the budget amount granted by the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectShare {
    pub funding_source_id: i32,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub percentage: f64,
}

impl From<ProjectShare> for FundingShare {
    fn from(share: ProjectShare) -> Self {
        Self {
            funding_source_id: share.funding_source_id,
            percentage: share.percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FundingAllocation {
    pub funding_source_id: i32,
    pub percentage: f64,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FundingError {
    #[error("Funding percentage for source {funding_source_id} must be greater than 0 and at most 100")]
    PercentageOutOfRange { funding_source_id: i32 },
    #[error("Funding percentage for source {funding_source_id} must have at most two decimals")]
    TooPrecise { funding_source_id: i32 },
    #[error("Funding amount for source {funding_source_id} must be between 0 and 99999999.99")]
    AmountOutOfRange { funding_source_id: i32 },
    #[error("Funding source {funding_source_id} appears more than once")]
    DuplicateSource { funding_source_id: i32 },
    #[error("Funding percentages must add up to 100 (got {total:.2})")]
    TotalMismatch { total: f64 },
}

fn check_unique(ids: impl IntoIterator<Item = i32>) -> Result<(), FundingError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(FundingError::DuplicateSource { funding_source_id: id });
        }
    }
    Ok(())
}

/// Percentages are stored with two decimals.
fn check_precision(funding_source_id: i32, percentage: f64) -> Result<(), FundingError> {
    let scaled = percentage * 100.0;
    if (scaled - scaled.round()).abs() > 1e-6 {
        return Err(FundingError::TooPrecise { funding_source_id });
    }
    Ok(())
}

fn check_total(total: f64) -> Result<(), FundingError> {
    if (total - 100.0).abs() > PERCENT_TOLERANCE {
        return Err(FundingError::TotalMismatch { total });
    }
    Ok(())
}

/// Validate an explicit per-entry distribution.
pub fn validate_entry_shares(shares: &[FundingShare]) -> Result<(), FundingError> {
    for share in shares {
        if !(share.percentage > 0.0 && share.percentage <= 100.0) {
            return Err(FundingError::PercentageOutOfRange {
                funding_source_id: share.funding_source_id,
            });
        }
        check_precision(share.funding_source_id, share.percentage)?;
    }
    check_unique(shares.iter().map(|s| s.funding_source_id))?;
    if !shares.is_empty() {
        check_total(shares.iter().map(|s| s.percentage).sum())?;
    }
    Ok(())
}

/// Validate a project's distribution. An empty list clears the project's funding.
pub fn validate_project_shares(shares: &[ProjectShare]) -> Result<(), FundingError> {
    for share in shares {
        if !(0.0..=100.0).contains(&share.percentage) {
            return Err(FundingError::PercentageOutOfRange {
                funding_source_id: share.funding_source_id,
            });
        }
        check_precision(share.funding_source_id, share.percentage)?;
        if !(0.0..=MAX_FUNDING_AMOUNT).contains(&share.amount) {
            return Err(FundingError::AmountOutOfRange {
                funding_source_id: share.funding_source_id,
            });
        }
    }
    check_unique(shares.iter().map(|s| s.funding_source_id))?;
    if !shares.is_empty() {
        check_total(shares.iter().map(|s| s.percentage).sum())?;
    }
    Ok(())
}

/// Pick the distribution a time entry is booked with.
pub fn resolve_shares(
    explicit: Option<Vec<FundingShare>>,
    project_default: &[ProjectShare],
) -> Vec<FundingShare> {
    match explicit {
        Some(shares) if !shares.is_empty() => shares,
        _ => project_default
            .iter()
            .filter(|share| share.percentage > 0.0)
            .map(|&share| share.into())
            .collect(),
    }
}

fn to_hundredths(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Split `hours` across `shares`.
///
/// Each source gets `hours * percentage / 100`, floored to hundredths;
/// the leftover hundredths go to the largest fractional parts (ties to
/// the earlier share).
pub fn allocate(hours: f64, shares: &[FundingShare]) -> Vec<FundingAllocation> {
    if shares.is_empty() {
        return Vec::new();
    }

    let total_units = to_hundredths(hours);
    let percent_total: f64 = shares.iter().map(|s| s.percentage).sum();
    let target_units = ((total_units as f64) * percent_total / 100.0).round() as i64;

    let exact: Vec<f64> = shares
        .iter()
        .map(|s| (total_units as f64) * s.percentage / 100.0)
        .collect();
    let mut units: Vec<i64> = exact.iter().map(|e| e.floor() as i64).collect();

    let mut leftover = target_units - units.iter().sum::<i64>();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &idx in order.iter().cycle() {
        if leftover <= 0 {
            break;
        }
        units[idx] += 1;
        leftover -= 1;
    }

    shares
        .iter()
        .zip(units)
        .map(|(share, u)| FundingAllocation {
            funding_source_id: share.funding_source_id,
            percentage: share.percentage,
            hours: u as f64 / 100.0,
        })
        .collect()
}
