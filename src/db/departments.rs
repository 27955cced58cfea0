use std::collections::HashMap;

use anyhow::Result;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::models::{Department, DepartmentListQuery, DepartmentMember, DepartmentPayload};

use super::{Database, like_pattern, order_clause};

const DEPARTMENT_SORTS: [(&str, &str); 2] = [("name", "d.name"), ("description", "d.description")];

#[derive(sqlx::FromRow)]
struct MemberRow {
    department_id: i32,
    #[sqlx(flatten)]
    member: DepartmentMember,
}

async fn insert_members(conn: &mut PgConnection, department_id: i32, user_ids: &[i32]) -> Result<()> {
    if user_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO department_users (department_id, user_id)
         SELECT $1, user_id FROM UNNEST($2::int4[]) AS t(user_id)
         ON CONFLICT DO NOTHING",
    )
    .bind(department_id)
    .bind(user_ids)
    .execute(conn)
    .await?;

    Ok(())
}

impl Database {
    pub async fn list_departments(&self, query: &DepartmentListQuery) -> Result<Vec<Department>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT d.id, d.name, d.description FROM departments d WHERE 1 = 1");

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (d.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR d.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder.push(order_clause(
            query.sort.as_deref(),
            query.order.as_deref(),
            &DEPARTMENT_SORTS,
            "d.name ASC",
        ));

        let departments = builder.build_query_as::<Department>().fetch_all(&self.pool).await?;

        Ok(departments)
    }

    pub async fn get_department(&self, id: i32) -> Result<Option<Department>> {
        let department = sqlx::query_as::<_, Department>("SELECT id, name, description FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(department)
    }

    pub async fn members_by_department(&self, department_ids: &[i32]) -> Result<HashMap<i32, Vec<DepartmentMember>>> {
        if department_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT du.department_id, u.id, u.username, u.full_name, u.email, u.role
             FROM users u
             JOIN department_users du ON du.user_id = u.id
             WHERE du.department_id = ANY($1)
             ORDER BY u.full_name, u.id",
        )
        .bind(department_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<DepartmentMember>> = HashMap::new();
        for row in rows {
            grouped.entry(row.department_id).or_default().push(row.member);
        }
        Ok(grouped)
    }

    pub async fn create_department(&self, payload: &DepartmentPayload) -> Result<i32> {
        let mut tx = self.begin().await?;

        let id: i32 = sqlx::query_scalar("INSERT INTO departments (name, description) VALUES ($1, $2) RETURNING id")
            .bind(&payload.name)
            .bind(&payload.description)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(users) = &payload.users {
            insert_members(&mut *tx, id, users).await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    /// Returns false when the department does not exist.
    pub async fn update_department(&self, id: i32, payload: &DepartmentPayload) -> Result<bool> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query("UPDATE departments SET name = $2, description = $3 WHERE id = $1")
            .bind(id)
            .bind(&payload.name)
            .bind(&payload.description)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(users) = &payload.users {
            sqlx::query("DELETE FROM department_users WHERE department_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_members(&mut *tx, id, users).await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    pub async fn delete_department(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
