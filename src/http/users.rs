use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::{Action, Role, can_update_user, password};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateUserRequest, NewUser, SUPPORTED_LANGUAGES, UpdateUserRequest, User, UserDetail, UserListQuery,
};

use super::auth::require_credentials;
use super::{ApiJson, ApiPath, ApiQuery, AppState, AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user))
}

/// Users created by staff default to project manager.
const DEFAULT_CREATED_ROLE: Role = Role::ProjectManager;

async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.db.list_users(&query).await?))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    user.authorize(Action::CreateUsers)?;
    require_credentials(&req.username, &req.password)?;

    if state.db.username_exists(&req.username).await? {
        return Err(AppError::conflict("Username already exists"));
    }

    let role = req.role.unwrap_or(DEFAULT_CREATED_ROLE);
    let password_hash = password::hash(req.password, state.config.bcrypt_cost).await?;
    let user_id = state
        .db
        .create_user(&NewUser {
            username: req.username,
            password_hash,
            full_name: req.full_name,
            email: req.email,
            role,
        })
        .await?;

    info!(user_id, %role, created_by = user.id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "userId": user_id })),
    ))
}

async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<UserDetail>> {
    let user = state
        .db
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let projects = state.db.get_user_projects(id).await?;
    let departments = state.db.get_user_departments(id).await?;

    Ok(Json(UserDetail {
        user,
        projects,
        departments,
    }))
}

fn validate_update(actor: &AuthUser, target_id: i32, req: &UpdateUserRequest) -> AppResult<()> {
    if req.role.is_some() {
        actor.authorize(Action::ChangeRoles)?;
    }
    if !can_update_user(actor.id, actor.role, target_id) {
        actor.authorize(Action::ManageOtherUsers)?;
    }
    if let Some(language) = req.language.as_deref() {
        if !SUPPORTED_LANGUAGES.contains(&language) {
            return Err(AppError::validation(format!(
                "Unsupported language; expected one of: {}",
                SUPPORTED_LANGUAGES.join(", ")
            )));
        }
    }
    Ok(())
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i32>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    validate_update(&user, id, &req)?;

    let updated = state
        .db
        .update_user(
            id,
            req.full_name.as_deref(),
            req.email.as_deref(),
            req.role,
            req.language.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    info!(user_id = id, updated_by = user.id, "user updated");

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: i32, role: Role) -> AuthUser {
        AuthUser {
            id,
            username: format!("user{id}"),
            role,
        }
    }

    fn message(result: AppResult<()>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn users_may_update_their_own_profile() {
        let req = UpdateUserRequest {
            full_name: Some("New Name".into()),
            language: Some("lv".into()),
            ..Default::default()
        };
        assert!(validate_update(&actor(3, Role::Employee), 3, &req).is_ok());
    }

    #[test]
    fn only_admin_and_hr_change_roles() {
        let req = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert_eq!(
            message(validate_update(&actor(3, Role::Employee), 3, &req)),
            "Not authorized to change roles"
        );
        assert_eq!(
            message(validate_update(&actor(3, Role::ProjectManager), 4, &req)),
            "Not authorized to change roles"
        );
        assert!(validate_update(&actor(1, Role::Hr), 4, &req).is_ok());
        assert!(validate_update(&actor(1, Role::Admin), 4, &req).is_ok());
    }

    #[test]
    fn other_profiles_need_admin_or_hr() {
        let req = UpdateUserRequest::default();
        assert_eq!(
            message(validate_update(&actor(3, Role::ProjectManager), 4, &req)),
            "Not authorized to update other users"
        );
        assert!(validate_update(&actor(9, Role::Hr), 4, &req).is_ok());
    }

    #[test]
    fn unknown_languages_are_rejected() {
        let req = UpdateUserRequest {
            language: Some("de".into()),
            ..Default::default()
        };
        let err = validate_update(&actor(3, Role::Employee), 3, &req).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
