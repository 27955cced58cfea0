use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ProjectManager,
    Hr,
    Employee,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::ProjectManager, Role::Hr, Role::Employee];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project_manager",
            Role::Hr => "hr",
            Role::Employee => "employee",
        }
    }

    /// Roles a self-registering user may pick; anything else becomes employee.
    pub fn for_self_registration(requested: Option<&str>) -> Role {
        match requested.and_then(|r| r.parse().ok()) {
            Some(role @ (Role::ProjectManager | Role::Employee)) => role,
            _ => Role::Employee,
        }
    }

    /// Employees are scoped to their own data and assigned projects.
    pub fn is_employee(self) -> bool {
        self == Role::Employee
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "project_manager" => Ok(Role::ProjectManager),
            "hr" => Ok(Role::Hr),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Operations gated by global role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageProjects,
    ReplaceProjectUsers,
    ManageProjectFunding,
    CreateUsers,
    ManageOtherUsers,
    ChangeRoles,
    ManageDepartments,
    DeleteDepartments,
    ManageFundingSources,
}

impl Action {
    fn allowed_roles(self) -> &'static [Role] {
        match self {
            Action::ManageProjects | Action::ManageProjectFunding => &[Role::ProjectManager],
            Action::ReplaceProjectUsers => &[Role::Admin, Role::ProjectManager],
            Action::CreateUsers | Action::ManageOtherUsers | Action::ChangeRoles => {
                &[Role::Admin, Role::Hr]
            }
            Action::ManageDepartments => &[Role::Admin, Role::ProjectManager],
            Action::DeleteDepartments => &[Role::Admin],
            Action::ManageFundingSources => &[Role::ProjectManager],
        }
    }

    fn denied_message(self) -> &'static str {
        match self {
            Action::ChangeRoles => "Not authorized to change roles",
            Action::ManageOtherUsers => "Not authorized to update other users",
            _ => "Not authorized for this operation",
        }
    }
}

/// Admin passes every gate; other roles need to be listed for the action.
pub fn is_allowed(role: Role, action: Action) -> bool {
    role == Role::Admin || action.allowed_roles().contains(&role)
}

pub fn authorize(role: Role, action: Action) -> Result<(), AppError> {
    if is_allowed(role, action) {
        Ok(())
    } else {
        tracing::debug!(%role, ?action, "authorization denied");
        Err(AppError::forbidden(action.denied_message()))
    }
}

/// Whether `actor` may read or modify time entries owned by `owner_id`.
pub fn can_access_user_entries(actor_id: i32, actor_role: Role, owner_id: i32) -> bool {
    !actor_role.is_employee() || actor_id == owner_id
}

/// Whether `actor` may update the profile of `target_id`.
pub fn can_update_user(actor_id: i32, actor_role: Role, target_id: i32) -> bool {
    actor_id == target_id || is_allowed(actor_role, Action::ManageOtherUsers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn self_registration_cannot_escalate() {
        assert_eq!(Role::for_self_registration(Some("project_manager")), Role::ProjectManager);
        assert_eq!(Role::for_self_registration(Some("employee")), Role::Employee);
        assert_eq!(Role::for_self_registration(Some("admin")), Role::Employee);
        assert_eq!(Role::for_self_registration(Some("hr")), Role::Employee);
        assert_eq!(Role::for_self_registration(None), Role::Employee);
    }

    #[test]
    fn admin_passes_every_gate() {
        for action in [
            Action::ManageProjects,
            Action::ReplaceProjectUsers,
            Action::ManageProjectFunding,
            Action::CreateUsers,
            Action::ManageOtherUsers,
            Action::ChangeRoles,
            Action::ManageDepartments,
            Action::DeleteDepartments,
            Action::ManageFundingSources,
        ] {
            assert!(is_allowed(Role::Admin, action), "{action:?}");
            assert!(!is_allowed(Role::Employee, action), "{action:?}");
        }
    }

    #[test]
    fn matrix_for_non_admin_roles() {
        assert!(is_allowed(Role::ProjectManager, Action::ManageProjects));
        assert!(!is_allowed(Role::Hr, Action::ManageProjects));
        assert!(is_allowed(Role::Hr, Action::CreateUsers));
        assert!(!is_allowed(Role::ProjectManager, Action::CreateUsers));
        assert!(is_allowed(Role::ProjectManager, Action::ManageDepartments));
        assert!(!is_allowed(Role::ProjectManager, Action::DeleteDepartments));
        assert!(is_allowed(Role::ProjectManager, Action::ManageFundingSources));
        assert!(!is_allowed(Role::Hr, Action::ManageFundingSources));
    }

    #[test]
    fn denial_is_forbidden() {
        let err = authorize(Role::Employee, Action::ChangeRoles).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Not authorized to change roles"));
    }

    #[test]
    fn employees_only_reach_their_own_entries() {
        assert!(can_access_user_entries(7, Role::Employee, 7));
        assert!(!can_access_user_entries(7, Role::Employee, 8));
        assert!(can_access_user_entries(1, Role::Hr, 8));
        assert!(can_access_user_entries(1, Role::ProjectManager, 8));
        assert!(can_access_user_entries(1, Role::Admin, 8));
    }

    #[test]
    fn profile_updates_are_self_or_privileged() {
        assert!(can_update_user(3, Role::Employee, 3));
        assert!(!can_update_user(3, Role::ProjectManager, 4));
        assert!(can_update_user(3, Role::Hr, 4));
    }
}
