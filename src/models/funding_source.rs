use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct FundingSource {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Default)]
pub struct FundingSourcePayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl FundingSourcePayload {
    /// The trimmed name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// A project drawing on a funding source.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct FundedProject {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub amount: f64,
    pub percentage: f64,
}
