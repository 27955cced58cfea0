use serde::{Deserialize, Serialize};

use crate::auth::Role;

use super::{Department, UserProject};

pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "lv"];

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub language: String,
}

/// A user row including the stored password hash; never serialized.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserCredentials {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub language: String,
}

impl UserCredentials {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            role: self.role,
            language: self.language,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub projects: Vec<UserProject>,
    pub departments: Vec<Department>,
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<Role>,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub language: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub sort: Option<String>,
    pub order: Option<String>,
}
