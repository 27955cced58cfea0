use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::Config;

mod departments;
mod funding;
mod projects;
mod reports;
mod time_entries;
mod users;

pub(crate) const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.start_date, p.end_date, \
     p.budget::float8 AS budget, p.contract_number, p.min_workload::float8 AS min_workload, \
     p.created_by, p.created_at";

pub(crate) const TIME_ENTRY_COLUMNS: &str = "te.id, te.user_id, te.project_id, te.date, \
     te.hours::float8 AS hours, te.description, te.entry_type, te.created_at, te.updated_at";

/// Tables reported by `check-db`, in dependency order.
pub const TABLES: [&str; 9] = [
    "users",
    "projects",
    "project_users",
    "departments",
    "department_users",
    "funding_sources",
    "project_funding",
    "time_entries",
    "time_entry_funding",
];

/// Whitelisted `ORDER BY` clause; anything unknown falls back to `default`.
pub(crate) fn order_clause(
    sort: Option<&str>,
    order: Option<&str>,
    allowed: &[(&str, &'static str)],
    default: &'static str,
) -> String {
    let column = sort.and_then(|s| allowed.iter().find(|(key, _)| *key == s).map(|(_, col)| *col));
    match column {
        Some(column) => {
            let direction = if order == Some("desc") { "DESC" } else { "ASC" };
            format!(" ORDER BY {column} {direction}")
        }
        None => format!(" ORDER BY {default}"),
    }
}

/// `%term%` for `ILIKE`, with wildcard characters in the term escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(config.database_url())
            .await
            .context("failed to connect to the database")?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a transaction; dropping it without commit rolls back
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    /// Row counts per table
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

/// Initialize the database connection pool and bring the schema up to date
pub async fn init(config: &Config) -> Result<Database> {
    let db = Database::new(config).await?;

    db.migrate().await?;

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: [(&str, &str); 2] = [("name", "p.name"), ("budget", "p.budget")];

    #[test]
    fn known_sort_columns_are_used() {
        assert_eq!(
            order_clause(Some("name"), Some("desc"), &ALLOWED, "p.created_at DESC"),
            " ORDER BY p.name DESC"
        );
        assert_eq!(
            order_clause(Some("budget"), None, &ALLOWED, "p.created_at DESC"),
            " ORDER BY p.budget ASC"
        );
    }

    #[test]
    fn unknown_sort_columns_fall_back() {
        assert_eq!(
            order_clause(Some("name; DROP TABLE users"), Some("desc"), &ALLOWED, "p.created_at DESC"),
            " ORDER BY p.created_at DESC"
        );
        assert_eq!(order_clause(None, None, &ALLOWED, "p.id ASC"), " ORDER BY p.id ASC");
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("alpha"), "%alpha%");
        assert_eq!(like_pattern("50%_x"), "%50\\%\\_x%");
    }
}
