mod department;
mod funding_source;
mod project;
mod time_entry;
mod user;

pub use department::{Department, DepartmentListQuery, DepartmentMember, DepartmentPayload, DepartmentWithUsers};
pub use funding_source::{FundedProject, FundingSource, FundingSourcePayload};
pub use project::{
    AssignUserRequest, CREATOR_DEFAULT_WORKLOAD, MAX_BUDGET, MAX_WORKLOAD, Project, ProjectAssignment, ProjectFunding,
    ProjectFundingRequest, ProjectListQuery, ProjectMember, ProjectPayload, ProjectRole,
    ProjectUserInput, ProjectWithUsers, UpdateAssignmentRequest, UserProject,
};
pub use time_entry::{
    CreateTimeEntryRequest, EntryType, FundingSourceEntriesQuery, FundingSourceTimeEntry, MAX_ENTRY_HOURS,
    NewTimeEntry, ProjectTimeEntry, TimeEntry, TimeEntryDetail, TimeEntryFunding, UpdateTimeEntryRequest,
    UserTimeEntry, month_bounds, round_hours, validate_hours,
};
pub use user::{
    CreateUserRequest, LoginRequest, LoginResponse, NewUser, RegisterRequest, SUPPORTED_LANGUAGES,
    UpdateUserRequest, User, UserCredentials, UserDetail, UserListQuery,
};
