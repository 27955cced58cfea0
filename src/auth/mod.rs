//! Authentication and role-based authorization.

pub mod password;
pub mod policy;
pub mod token;

pub use policy::{authorize, can_access_user_entries, can_update_user, Action, Role};
pub use token::{Claims, TokenError, TokenService};
