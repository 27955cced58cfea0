use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::{Action, Role, authorize, can_access_user_entries};
use crate::error::AppError;

use super::AppState;

/// JSON body whose rejections are reported as `{ "message": ... }`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// The caller identified by the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn authorize(&self, action: Action) -> Result<(), AppError> {
        authorize(self.role, action).inspect_err(|_| {
            tracing::info!(
                user_id = self.id,
                username = %self.username,
                role = %self.role,
                ?action,
                "permission denied"
            );
        })
    }

    /// Employees may only touch their own time entries.
    pub fn ensure_entry_access(&self, owner_id: i32, denied: &'static str) -> Result<(), AppError> {
        if can_access_user_entries(self.id, self.role, owner_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(denied))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized("Access denied"))?;

        let claims = state.tokens.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "rejected bearer token");
            AppError::forbidden("Invalid token")
        })?;

        Ok(AuthUser {
            id: claims.id,
            username: claims.username,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/projects");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn role_gated_actions_are_forbidden_for_employees() {
        let employee = AuthUser { id: 5, username: "emp".into(), role: Role::Employee };
        let err = employee.authorize(Action::ManageProjects).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);

        let pm = AuthUser { id: 2, username: "pm".into(), role: Role::ProjectManager };
        assert!(pm.authorize(Action::ManageProjects).is_ok());
    }

    #[test]
    fn employees_only_reach_their_own_entries() {
        let employee = AuthUser { id: 5, username: "emp".into(), role: Role::Employee };
        assert!(employee.ensure_entry_access(5, "denied").is_ok());
        let err = employee.ensure_entry_access(6, "denied").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "denied");

        let hr = AuthUser { id: 1, username: "hr".into(), role: Role::Hr };
        assert!(hr.ensure_entry_access(6, "denied").is_ok());
    }
}
