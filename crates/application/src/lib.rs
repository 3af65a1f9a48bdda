//! Application services and ports.

#![forbid(unsafe_code)]

mod access_admin_service;
mod access_control;
mod access_ports;
mod permission_gates;
mod reference_resolution;
mod subject_access_service;

pub use access_admin_service::{AccessAdminService, AccessRepositories};
pub use access_control::AccessControl;
pub use access_ports::{
    AssignmentRepository, CreateGroupInput, CreateGuardInput, CreateRoleInput, EntityFilter,
    EntityQuery, GroupChanges, GroupRecord, GroupRelation, GroupRepository, GuardPermissionInput,
    GuardRecord, GuardRelation, Listing, NameFilter, NewGroup, NewRole, PermissionGuardRepository,
    PermissionRecord, PermissionRelation, PermissionRepository, RoleChanges, RoleRecord,
    RoleRelation, RoleRepository, UpdateGroupInput, UpdateGuardInput, UpdateRoleInput,
};
pub use permission_gates::PermissionGates;
pub use subject_access_service::{AccessSubject, SubjectAccessService};
