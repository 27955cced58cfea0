use anyhow::Result;

use crate::models::{FundedProject, FundingSource};

use super::Database;

impl Database {
    pub async fn list_funding_sources(&self) -> Result<Vec<FundingSource>> {
        let sources = sqlx::query_as::<_, FundingSource>(
            "SELECT id, name, description, created_at FROM funding_sources ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(sources)
    }

    pub async fn get_funding_source(&self, id: i32) -> Result<Option<FundingSource>> {
        let source = sqlx::query_as::<_, FundingSource>(
            "SELECT id, name, description, created_at FROM funding_sources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }

    pub async fn create_funding_source(&self, name: &str, description: Option<&str>) -> Result<FundingSource> {
        let source = sqlx::query_as::<_, FundingSource>(
            "INSERT INTO funding_sources (name, description) VALUES ($1, $2)
             RETURNING id, name, description, created_at",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(source)
    }

    pub async fn update_funding_source(
        &self,
        id: i32,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<FundingSource>> {
        let source = sqlx::query_as::<_, FundingSource>(
            "UPDATE funding_sources SET name = $2, description = $3 WHERE id = $1
             RETURNING id, name, description, created_at",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(source)
    }

    /// Number of projects drawing on a funding source.
    pub async fn funding_source_project_count(&self, id: i32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_funding WHERE funding_source_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn delete_funding_source(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM funding_sources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn funded_projects(&self, funding_source_id: i32) -> Result<Vec<FundedProject>> {
        let projects = sqlx::query_as::<_, FundedProject>(
            "SELECT p.id, p.name, p.description, pf.amount::float8 AS amount, pf.percentage::float8 AS percentage
             FROM projects p
             JOIN project_funding pf ON pf.project_id = p.id
             WHERE pf.funding_source_id = $1
             ORDER BY p.name",
        )
        .bind(funding_source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }
}
