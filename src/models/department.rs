use serde::{Deserialize, Serialize};

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Department {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct DepartmentMember {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
}

#[derive(Serialize, Debug)]
pub struct DepartmentWithUsers {
    #[serde(flatten)]
    pub department: Department,
    pub users: Vec<DepartmentMember>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DepartmentPayload {
    pub name: String,
    pub description: Option<String>,
    pub users: Option<Vec<i32>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DepartmentListQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}
