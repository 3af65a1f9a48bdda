mod inputs;
mod queries;
mod records;
mod repositories;

pub use inputs::{
    CreateGroupInput, CreateGuardInput, CreateRoleInput, GroupChanges, GuardPermissionInput,
    NewGroup, NewRole, RoleChanges, UpdateGroupInput, UpdateGuardInput, UpdateRoleInput,
};
pub use queries::{
    EntityFilter, EntityQuery, GroupRelation, GuardRelation, Listing, NameFilter,
    PermissionRelation, RoleRelation,
};
pub use records::{GroupRecord, GuardRecord, PermissionRecord, RoleRecord};
pub use repositories::{
    AssignmentRepository, GroupRepository, PermissionGuardRepository, PermissionRepository,
    RoleRepository,
};
