use std::collections::HashMap;

use anyhow::Result;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::funding::ProjectShare;
use crate::models::{
    CREATOR_DEFAULT_WORKLOAD, Project, ProjectFunding, ProjectListQuery, ProjectMember, ProjectPayload,
    ProjectRole, ProjectUserInput,
};

use super::{Database, PROJECT_COLUMNS, like_pattern, order_clause};

const PROJECT_SORTS: [(&str, &str); 5] = [
    ("name", "p.name"),
    ("start_date", "p.start_date"),
    ("end_date", "p.end_date"),
    ("budget", "p.budget"),
    ("created_at", "p.created_at"),
];

const MEMBER_COLUMNS: &str = "u.id, u.username, u.full_name, u.email, u.role, \
     pu.role AS project_role, pu.workload::float8 AS workload";

#[derive(sqlx::FromRow)]
struct MemberRow {
    project_id: i32,
    #[sqlx(flatten)]
    member: ProjectMember,
}

/// Members for a project as created: the listed users, plus the creator as
/// project manager unless they listed themselves.
pub(crate) fn members_with_creator(users: &[ProjectUserInput], creator_id: i32) -> Vec<ProjectUserInput> {
    let mut members = users.to_vec();
    if !members.iter().any(|u| u.id == creator_id) {
        members.push(ProjectUserInput {
            id: creator_id,
            project_role: Some(ProjectRole::ProjectManager),
            workload: Some(CREATOR_DEFAULT_WORKLOAD),
        });
    }
    members
}

async fn insert_members(conn: &mut PgConnection, project_id: i32, users: &[ProjectUserInput]) -> Result<()> {
    if users.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO project_users (project_id, user_id, role, workload) ");
    builder.push_values(users, |mut row, user| {
        row.push_bind(project_id)
            .push_bind(user.id)
            .push_bind(user.role().as_str())
            .push_bind(user.workload())
            .push_unseparated("::numeric");
    });
    builder.build().execute(conn).await?;

    Ok(())
}

async fn insert_funding(conn: &mut PgConnection, project_id: i32, shares: &[ProjectShare]) -> Result<()> {
    if shares.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO project_funding (project_id, funding_source_id, amount, percentage) ");
    builder.push_values(shares, |mut row, share| {
        row.push_bind(project_id)
            .push_bind(share.funding_source_id)
            .push_bind(share.amount)
            .push_unseparated("::numeric")
            .push_bind(share.percentage)
            .push_unseparated("::numeric");
    });
    builder.build().execute(conn).await?;

    Ok(())
}

/// The project's distribution, read on the given connection.
pub(crate) async fn project_shares(conn: &mut PgConnection, project_id: i32) -> Result<Vec<ProjectShare>> {
    let rows: Vec<(i32, f64, f64)> = sqlx::query_as(
        "SELECT funding_source_id, amount::float8, percentage::float8
         FROM project_funding
         WHERE project_id = $1
         ORDER BY funding_source_id",
    )
    .bind(project_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(funding_source_id, amount, percentage)| ProjectShare {
            funding_source_id,
            amount,
            percentage,
        })
        .collect())
}

impl Database {
    /// List projects; `member_id` restricts to projects that user is assigned to.
    pub async fn list_projects(&self, query: &ProjectListQuery, member_id: Option<i32>) -> Result<Vec<Project>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE 1 = 1"));

        if let Some(user_id) = member_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM project_users pu WHERE pu.project_id = p.id AND pu.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.contract_number ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(order_clause(
            query.sort.as_deref(),
            query.order.as_deref(),
            &PROJECT_SORTS,
            "p.created_at DESC",
        ));

        let projects = builder.build_query_as::<Project>().fetch_all(&self.pool).await?;

        Ok(projects)
    }

    pub async fn get_project(&self, id: i32) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(&format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(project)
    }

    pub async fn project_members(&self, project_id: i32) -> Result<Vec<ProjectMember>> {
        let members = sqlx::query_as::<_, ProjectMember>(&format!(
            "SELECT {MEMBER_COLUMNS}
             FROM users u
             JOIN project_users pu ON pu.user_id = u.id
             WHERE pu.project_id = $1
             ORDER BY u.full_name, u.id"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Members of several projects in one round trip, keyed by project id.
    pub async fn members_by_project(&self, project_ids: &[i32]) -> Result<HashMap<i32, Vec<ProjectMember>>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT pu.project_id, {MEMBER_COLUMNS}
             FROM users u
             JOIN project_users pu ON pu.user_id = u.id
             WHERE pu.project_id = ANY($1)
             ORDER BY u.full_name, u.id"
        ))
        .bind(project_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<ProjectMember>> = HashMap::new();
        for row in rows {
            grouped.entry(row.project_id).or_default().push(row.member);
        }
        Ok(grouped)
    }

    pub async fn is_assigned(&self, project_id: i32, user_id: i32) -> Result<bool> {
        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_users WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assigned)
    }

    /// Create a project with its members and funding in one transaction.
    pub async fn create_project(&self, payload: &ProjectPayload, creator_id: i32) -> Result<i32> {
        let mut tx = self.begin().await?;

        let project_id: i32 = sqlx::query_scalar(
            "INSERT INTO projects (name, description, start_date, end_date, budget, contract_number, min_workload, created_by)
             VALUES ($1, $2, $3, $4, $5::numeric, $6, $7::numeric, $8)
             RETURNING id",
        )
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .bind(payload.budget.unwrap_or(0.0))
        .bind(&payload.contract_number)
        .bind(payload.min_workload.unwrap_or(0.0))
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        let members = members_with_creator(payload.users.as_deref().unwrap_or_default(), creator_id);
        insert_members(&mut *tx, project_id, &members).await?;

        if let Some(shares) = &payload.funding_sources {
            insert_funding(&mut *tx, project_id, shares).await?;
        }

        tx.commit().await?;

        Ok(project_id)
    }

    /// Update a project; `users` and `funding_sources` replace the stored
    /// lists when present. Returns false when the project does not exist.
    pub async fn update_project(&self, id: i32, payload: &ProjectPayload) -> Result<bool> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query(
            "UPDATE projects
             SET name = $2, description = $3, start_date = $4, end_date = $5,
                 budget = COALESCE($6::numeric, budget), contract_number = $7,
                 min_workload = COALESCE($8::numeric, min_workload)
             WHERE id = $1",
        )
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .bind(payload.budget)
        .bind(&payload.contract_number)
        .bind(payload.min_workload)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(users) = &payload.users {
            sqlx::query("DELETE FROM project_users WHERE project_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_members(&mut *tx, id, users).await?;
        }

        if let Some(shares) = &payload.funding_sources {
            sqlx::query("DELETE FROM project_funding WHERE project_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_funding(&mut *tx, id, shares).await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    pub async fn delete_project(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn assign_user(&self, project_id: i32, user_id: i32, role: ProjectRole, workload: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO project_users (project_id, user_id, role, workload)
             VALUES ($1, $2, $3, $4::numeric)",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(workload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Change an assignment; `None` keeps the stored value.
    pub async fn update_assignment(
        &self,
        project_id: i32,
        user_id: i32,
        role: Option<ProjectRole>,
        workload: Option<f64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE project_users
             SET role = COALESCE($3, role), workload = COALESCE($4::numeric, workload)
             WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.map(ProjectRole::as_str))
        .bind(workload)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_assignment(&self, project_id: i32, user_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM project_users WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace every assignment of a project in one transaction.
    pub async fn replace_project_users(&self, project_id: i32, users: &[ProjectUserInput]) -> Result<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM project_users WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        insert_members(&mut *tx, project_id, users).await?;

        tx.commit().await?;

        Ok(())
    }

    pub async fn project_funding(&self, project_id: i32) -> Result<Vec<ProjectFunding>> {
        let funding = sqlx::query_as::<_, ProjectFunding>(
            "SELECT pf.project_id, pf.funding_source_id, pf.amount::float8 AS amount,
                    pf.percentage::float8 AS percentage, fs.name, fs.description
             FROM project_funding pf
             JOIN funding_sources fs ON fs.id = pf.funding_source_id
             WHERE pf.project_id = $1
             ORDER BY fs.name",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(funding)
    }

    pub async fn find_project_funding(&self, project_id: i32, funding_source_id: i32) -> Result<Option<ProjectFunding>> {
        let funding = sqlx::query_as::<_, ProjectFunding>(
            "SELECT pf.project_id, pf.funding_source_id, pf.amount::float8 AS amount,
                    pf.percentage::float8 AS percentage, fs.name, fs.description
             FROM project_funding pf
             JOIN funding_sources fs ON fs.id = pf.funding_source_id
             WHERE pf.project_id = $1 AND pf.funding_source_id = $2",
        )
        .bind(project_id)
        .bind(funding_source_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(funding)
    }

    /// Replace a project's distribution in one transaction.
    pub async fn replace_project_funding(&self, project_id: i32, shares: &[ProjectShare]) -> Result<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM project_funding WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        insert_funding(&mut *tx, project_id, shares).await?;

        tx.commit().await?;

        Ok(())
    }
}
