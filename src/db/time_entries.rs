use anyhow::Result;
use chrono::NaiveDate;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::funding::{FundingAllocation, FundingShare, allocate, resolve_shares};
use crate::models::{
    FundingSourceTimeEntry, NewTimeEntry, ProjectTimeEntry, TimeEntry, TimeEntryDetail, TimeEntryFunding,
    UpdateTimeEntryRequest, UserTimeEntry,
};

use super::projects::project_shares;
use super::{Database, TIME_ENTRY_COLUMNS};

const FUNDING_NAMES: &str =
    "COALESCE(array_agg(DISTINCT fs.name::text) FILTER (WHERE fs.name IS NOT NULL), ARRAY[]::text[]) AS funding_sources";

const FUNDING_JOINS: &str = "LEFT JOIN time_entry_funding tef ON tef.time_entry_id = te.id
     LEFT JOIN funding_sources fs ON fs.id = tef.funding_source_id";

#[derive(sqlx::FromRow)]
struct EntryWithProject {
    #[sqlx(flatten)]
    entry: TimeEntry,
    project_name: Option<String>,
}

async fn insert_allocations(conn: &mut PgConnection, time_entry_id: i32, allocations: &[FundingAllocation]) -> Result<()> {
    if allocations.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO time_entry_funding (time_entry_id, funding_source_id, percentage, hours) ");
    builder.push_values(allocations, |mut row, allocation| {
        row.push_bind(time_entry_id)
            .push_bind(allocation.funding_source_id)
            .push_bind(allocation.percentage)
            .push_unseparated("::numeric")
            .push_bind(allocation.hours)
            .push_unseparated("::numeric");
    });
    builder.build().execute(conn).await?;

    Ok(())
}

async fn replace_allocations(conn: &mut PgConnection, time_entry_id: i32, allocations: &[FundingAllocation]) -> Result<()> {
    sqlx::query("DELETE FROM time_entry_funding WHERE time_entry_id = $1")
        .bind(time_entry_id)
        .execute(&mut *conn)
        .await?;
    insert_allocations(conn, time_entry_id, allocations).await
}

impl Database {
    pub async fn entries_for_user(&self, user_id: i32) -> Result<Vec<UserTimeEntry>> {
        let entries = sqlx::query_as::<_, UserTimeEntry>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS}, p.name AS project_name, {FUNDING_NAMES}
             FROM time_entries te
             LEFT JOIN projects p ON p.id = te.project_id
             {FUNDING_JOINS}
             WHERE te.user_id = $1
             GROUP BY te.id, p.id
             ORDER BY te.date DESC, te.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn entries_for_project(&self, project_id: i32) -> Result<Vec<ProjectTimeEntry>> {
        let entries = sqlx::query_as::<_, ProjectTimeEntry>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS}, u.full_name AS user_name, u.username, {FUNDING_NAMES}
             FROM time_entries te
             LEFT JOIN users u ON u.id = te.user_id
             {FUNDING_JOINS}
             WHERE te.project_id = $1
             GROUP BY te.id, u.id
             ORDER BY te.date DESC, te.id DESC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Funded slices booked on a source, optionally limited to `[from, to]`.
    pub async fn entries_for_funding_source(
        &self,
        funding_source_id: i32,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<FundingSourceTimeEntry>> {
        let (from, to) = period.unzip();
        let entries = sqlx::query_as::<_, FundingSourceTimeEntry>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS}, u.full_name AS user_name, u.username, p.name AS project_name,
                    tef.percentage::float8 AS percentage, tef.hours::float8 AS funding_hours,
                    fs.name AS funding_source_name
             FROM time_entry_funding tef
             JOIN time_entries te ON te.id = tef.time_entry_id
             JOIN users u ON u.id = te.user_id
             JOIN projects p ON p.id = te.project_id
             JOIN funding_sources fs ON fs.id = tef.funding_source_id
             WHERE tef.funding_source_id = $1
               AND ($2::date IS NULL OR te.date >= $2)
               AND ($3::date IS NULL OR te.date <= $3)
             ORDER BY te.date DESC, te.id DESC"
        ))
        .bind(funding_source_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn get_time_entry(&self, id: i32) -> Result<Option<TimeEntry>> {
        let entry = sqlx::query_as::<_, TimeEntry>(&format!("SELECT {TIME_ENTRY_COLUMNS} FROM time_entries te WHERE te.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    pub async fn entry_funding(&self, time_entry_id: i32) -> Result<Vec<TimeEntryFunding>> {
        let funding = sqlx::query_as::<_, TimeEntryFunding>(
            "SELECT tef.funding_source_id, tef.percentage::float8 AS percentage,
                    tef.hours::float8 AS hours, fs.name
             FROM time_entry_funding tef
             LEFT JOIN funding_sources fs ON fs.id = tef.funding_source_id
             WHERE tef.time_entry_id = $1
             ORDER BY tef.funding_source_id",
        )
        .bind(time_entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(funding)
    }

    pub async fn time_entry_detail(&self, id: i32) -> Result<Option<TimeEntryDetail>> {
        let row = sqlx::query_as::<_, EntryWithProject>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS}, p.name AS project_name
             FROM time_entries te
             LEFT JOIN projects p ON p.id = te.project_id
             WHERE te.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let funding_distribution = self.entry_funding(id).await?;

        Ok(Some(TimeEntryDetail {
            entry: row.entry,
            project_name: row.project_name,
            funding_distribution,
        }))
    }

    /// Book a time entry and split its hours across funding sources.
    ///
    /// The user must be assigned to the project. Without an explicit
    /// distribution the project's own distribution is used.
    pub async fn create_time_entry(&self, entry: &NewTimeEntry, explicit: Option<Vec<FundingShare>>) -> Result<i32> {
        let mut tx = self.begin().await?;

        let assigned: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM project_users WHERE project_id = $1 AND user_id = $2)",
        )
        .bind(entry.project_id)
        .bind(entry.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if !assigned {
            return Err(AppError::validation("User is not assigned to this project").into());
        }

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO time_entries (user_id, project_id, date, hours, description, entry_type)
             VALUES ($1, $2, $3, $4::numeric, $5, $6)
             RETURNING id",
        )
        .bind(entry.user_id)
        .bind(entry.project_id)
        .bind(entry.date)
        .bind(entry.hours)
        .bind(&entry.description)
        .bind(entry.entry_type.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let project_default = project_shares(&mut *tx, entry.project_id).await?;
        let shares = resolve_shares(explicit, &project_default);
        insert_allocations(&mut *tx, id, &allocate(entry.hours, &shares)).await?;

        tx.commit().await?;

        Ok(id)
    }

    /// Apply changes to an entry. A new distribution replaces the funding
    /// rows; a change of hours alone re-splits the stored percentages.
    /// Returns false when the entry does not exist.
    pub async fn update_time_entry(&self, id: i32, changes: &UpdateTimeEntryRequest) -> Result<bool> {
        let mut tx = self.begin().await?;

        let previous: Option<(f64, i32)> =
            sqlx::query_as("SELECT hours::float8, project_id FROM time_entries WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((previous_hours, project_id)) = previous else {
            return Ok(false);
        };

        let hours: f64 = sqlx::query_scalar(
            "UPDATE time_entries
             SET hours = COALESCE($2::numeric, hours),
                 description = COALESCE($3, description),
                 entry_type = COALESCE($4, entry_type),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING hours::float8",
        )
        .bind(id)
        .bind(changes.hours)
        .bind(&changes.description)
        .bind(changes.entry_type.map(|t| t.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        if let Some(explicit) = &changes.funding_distribution {
            let project_default = project_shares(&mut *tx, project_id).await?;
            let shares = resolve_shares(Some(explicit.clone()), &project_default);
            replace_allocations(&mut *tx, id, &allocate(hours, &shares)).await?;
        } else if (hours - previous_hours).abs() > f64::EPSILON {
            let rows: Vec<(i32, f64)> = sqlx::query_as(
                "SELECT funding_source_id, percentage::float8
                 FROM time_entry_funding
                 WHERE time_entry_id = $1
                 ORDER BY funding_source_id",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
            let shares: Vec<FundingShare> = rows
                .into_iter()
                .map(|(funding_source_id, percentage)| FundingShare {
                    funding_source_id,
                    percentage,
                })
                .collect();
            replace_allocations(&mut *tx, id, &allocate(hours, &shares)).await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    pub async fn delete_time_entry(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM time_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
