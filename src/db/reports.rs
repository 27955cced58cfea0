use anyhow::Result;
use chrono::NaiveDate;

use crate::models::ProjectAssignment;
use crate::reports::{AccountingRow, ExportEntryRow, SupervisoryRow};

use super::Database;

impl Database {
    /// Funded slices of a project's entries booked on one source, in date order.
    pub async fn accounting_rows(
        &self,
        project_id: i32,
        funding_source_id: i32,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<AccountingRow>> {
        let rows = sqlx::query_as::<_, AccountingRow>(
            "SELECT te.id, te.date, te.hours::float8 AS hours, te.description, te.entry_type,
                    u.id AS user_id, u.full_name, u.username,
                    tef.percentage::float8 AS percentage, tef.hours::float8 AS funded_hours
             FROM time_entries te
             JOIN users u ON u.id = te.user_id
             JOIN time_entry_funding tef ON tef.time_entry_id = te.id
             WHERE te.project_id = $1 AND tef.funding_source_id = $2
               AND ($3::date IS NULL OR te.date >= $3)
               AND ($4::date IS NULL OR te.date <= $4)
             ORDER BY te.date, u.full_name, te.id",
        )
        .bind(project_id)
        .bind(funding_source_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn supervisory_rows(
        &self,
        project_id: i32,
        user_id: Option<i32>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SupervisoryRow>> {
        let rows = sqlx::query_as::<_, SupervisoryRow>(
            "SELECT te.id, te.user_id, te.project_id, te.date, te.hours::float8 AS hours,
                    te.description, te.entry_type, te.created_at,
                    u.full_name, u.username, u.email,
                    COALESCE(string_agg(fs.name || ': ' || tef.percentage::float8::text || '%', ', ' ORDER BY fs.name), '')
                        AS funding_distribution
             FROM time_entries te
             JOIN users u ON u.id = te.user_id
             LEFT JOIN time_entry_funding tef ON tef.time_entry_id = te.id
             LEFT JOIN funding_sources fs ON fs.id = tef.funding_source_id
             WHERE te.project_id = $1
               AND ($2::int4 IS NULL OR te.user_id = $2)
               AND ($3::date IS NULL OR te.date >= $3)
               AND ($4::date IS NULL OR te.date <= $4)
             GROUP BY te.id, u.id
             ORDER BY u.full_name, te.date, te.id",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn project_assignments(&self, project_id: i32, user_id: Option<i32>) -> Result<Vec<ProjectAssignment>> {
        let assignments = sqlx::query_as::<_, ProjectAssignment>(
            "SELECT project_id, user_id, role, workload::float8 AS workload
             FROM project_users
             WHERE project_id = $1 AND ($2::int4 IS NULL OR user_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    /// Entries for a project export. With a funding source, only entries
    /// funded by it are listed and `hours` is the funded share.
    pub async fn export_rows(
        &self,
        project_id: i32,
        funding_source_id: Option<i32>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ExportEntryRow>> {
        let rows = sqlx::query_as::<_, ExportEntryRow>(
            "SELECT te.id, te.date, te.user_id,
                    COALESCE(NULLIF(u.full_name, ''), u.username) AS user_name,
                    te.entry_type, te.description,
                    COALESCE(tef.hours, te.hours)::float8 AS hours
             FROM time_entries te
             JOIN users u ON u.id = te.user_id
             LEFT JOIN time_entry_funding tef
                    ON tef.time_entry_id = te.id AND tef.funding_source_id = $2
             WHERE te.project_id = $1
               AND ($2::int4 IS NULL OR tef.funding_source_id IS NOT NULL)
               AND ($3::date IS NULL OR te.date >= $3)
               AND ($4::date IS NULL OR te.date <= $4)
             ORDER BY te.date, user_name, te.id",
        )
        .bind(project_id)
        .bind(funding_source_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
