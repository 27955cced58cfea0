use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::funding::ProjectShare;

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: f64,
    pub contract_number: Option<String>,
    pub min_workload: f64,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A user as seen through a project assignment.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ProjectMember {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub project_role: String,
    pub workload: f64,
}

#[derive(Serialize, Debug)]
pub struct ProjectWithUsers {
    #[serde(flatten)]
    pub project: Project,
    pub users: Vec<ProjectMember>,
}

/// A project as seen from one of its members.
#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct UserProject {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: f64,
    pub contract_number: Option<String>,
    pub project_role: String,
    pub workload: f64,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ProjectAssignment {
    pub project_id: i32,
    pub user_id: i32,
    pub role: String,
    pub workload: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    ProjectManager,
    #[default]
    Employee,
}

impl ProjectRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectRole::ProjectManager => "project_manager",
            ProjectRole::Employee => "employee",
        }
    }
}

/// Weekly hours given to the creator when they are added to their own project.
pub const CREATOR_DEFAULT_WORKLOAD: f64 = 40.0;

/// Largest value a `NUMERIC(6, 2)` workload column holds.
pub const MAX_WORKLOAD: f64 = 9_999.99;

/// Largest value the `NUMERIC(12, 2)` budget column holds.
pub const MAX_BUDGET: f64 = 9_999_999_999.99;

/// One member in a project create/update/replace payload.
#[derive(Deserialize, Debug, Clone)]
pub struct ProjectUserInput {
    #[serde(alias = "user_id")]
    pub id: i32,
    #[serde(default, alias = "role")]
    pub project_role: Option<ProjectRole>,
    pub workload: Option<f64>,
}

impl ProjectUserInput {
    pub fn role(&self) -> ProjectRole {
        self.project_role.unwrap_or_default()
    }

    pub fn workload(&self) -> f64 {
        self.workload.unwrap_or(0.0)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProjectPayload {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub contract_number: Option<String>,
    pub min_workload: Option<f64>,
    pub users: Option<Vec<ProjectUserInput>>,
    pub funding_sources: Option<Vec<ProjectShare>>,
}

#[derive(Deserialize, Debug)]
pub struct AssignUserRequest {
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: i32,
    pub role: Option<ProjectRole>,
    pub workload: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateAssignmentRequest {
    pub role: Option<ProjectRole>,
    pub workload: Option<f64>,
}

#[derive(Deserialize, Debug)]
pub struct ProjectFundingRequest {
    pub funding_distributions: Option<Vec<ProjectShare>>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct ProjectFunding {
    pub project_id: i32,
    pub funding_source_id: i32,
    pub amount: f64,
    pub percentage: f64,
    pub name: String,
    pub description: Option<String>,
}

impl ProjectFunding {
    pub fn share(&self) -> ProjectShare {
        ProjectShare {
            funding_source_id: self.funding_source_id,
            amount: self.amount,
            percentage: self.percentage,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ProjectListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}
