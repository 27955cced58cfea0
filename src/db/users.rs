use anyhow::Result;
use sqlx::{Postgres, QueryBuilder};

use crate::auth::Role;
use crate::models::{Department, NewUser, User, UserCredentials, UserListQuery, UserProject};

use super::{Database, like_pattern, order_clause};

const USER_COLUMNS: &str = "id, username, full_name, email, role, language";

const USER_SORTS: [(&str, &str); 4] = [
    ("username", "username"),
    ("full_name", "full_name"),
    ("email", "email"),
    ("role", "role"),
];

impl Database {
    pub async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let user = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, username, password_hash, full_name, email, role, language
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    pub async fn user_exists(&self, id: i32) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Insert a user and return its id.
    pub async fn create_user(&self, user: &NewUser) -> Result<i32> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, full_name, email, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1 = 1"));

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = query.role {
            builder.push(" AND role = ").push_bind(role.as_str());
        }
        builder.push(order_clause(
            query.sort.as_deref(),
            query.order.as_deref(),
            &USER_SORTS,
            "username ASC",
        ));

        let users = builder.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(users)
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Projects a user is assigned to, with their per-project role and workload.
    pub async fn get_user_projects(&self, user_id: i32) -> Result<Vec<UserProject>> {
        let projects = sqlx::query_as::<_, UserProject>(
            "SELECT p.id, p.name, p.description, p.start_date, p.end_date,
                    p.budget::float8 AS budget, p.contract_number,
                    pu.role AS project_role, pu.workload::float8 AS workload
             FROM projects p
             JOIN project_users pu ON pu.project_id = p.id
             WHERE pu.user_id = $1
             ORDER BY p.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    pub async fn get_user_departments(&self, user_id: i32) -> Result<Vec<Department>> {
        let departments = sqlx::query_as::<_, Department>(
            "SELECT d.id, d.name, d.description
             FROM departments d
             JOIN department_users du ON du.department_id = d.id
             WHERE du.user_id = $1
             ORDER BY d.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(departments)
    }

    /// Update profile fields; `None` keeps the stored value.
    pub async fn update_user(
        &self,
        id: i32,
        full_name: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
        language: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET full_name = COALESCE($2, full_name),
                 email = COALESCE($3, email),
                 role = COALESCE($4, role),
                 language = COALESCE($5, language)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .bind(role.map(Role::as_str))
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
