use async_trait::async_trait;

use rolegate_core::{AppResult, SubjectRef};
use rolegate_domain::{
    AccessKind, AssignmentKind, EntityRef, Group, GuardedPermission, Permission, Role,
};

use super::inputs::{
    CreateGuardInput, GroupChanges, NewGroup, NewRole, RoleChanges, UpdateGuardInput,
};
use super::queries::{
    EntityQuery, GroupRelation, GuardRelation, PermissionRelation, RoleRelation,
};
use super::records::{GroupRecord, GuardRecord, PermissionRecord, RoleRecord};

/// Repository port for permission guards and their nested permissions.
#[async_trait]
pub trait PermissionGuardRepository: Send + Sync {
    /// Executes a guard list query.
    async fn list_guards(&self, query: &EntityQuery<GuardRelation>)
    -> AppResult<Vec<GuardRecord>>;

    /// Finds one guard by id or key.
    async fn find_guard(
        &self,
        reference: &EntityRef,
        relations: &[GuardRelation],
    ) -> AppResult<Option<GuardRecord>>;

    /// Creates a guard and its nested permissions in one transaction.
    async fn create_guard(&self, input: CreateGuardInput) -> AppResult<GuardRecord>;

    /// Updates a guard and upserts nested permissions. `None` when missing.
    async fn update_guard(
        &self,
        guard_id: i64,
        input: UpdateGuardInput,
    ) -> AppResult<Option<GuardRecord>>;

    /// Deletes a guard with its permissions and their assignments.
    async fn delete_guard(&self, guard_id: i64) -> AppResult<bool>;
}

/// Repository port for permission reads.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Executes a permission list query.
    async fn list_permissions(
        &self,
        query: &EntityQuery<PermissionRelation>,
    ) -> AppResult<Vec<PermissionRecord>>;

    /// Finds one permission by id or key.
    async fn find_permission(
        &self,
        reference: &EntityRef,
        relations: &[PermissionRelation],
    ) -> AppResult<Option<PermissionRecord>>;

    /// Lists every permission key, ordered by id.
    async fn list_permission_keys(&self) -> AppResult<Vec<String>>;
}

/// Repository port for roles and their permission sets.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Executes a role list query.
    async fn list_roles(&self, query: &EntityQuery<RoleRelation>) -> AppResult<Vec<RoleRecord>>;

    /// Finds one role by id or key.
    async fn find_role(
        &self,
        reference: &EntityRef,
        relations: &[RoleRelation],
    ) -> AppResult<Option<RoleRecord>>;

    /// Creates a role and links its permissions.
    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord>;

    /// Updates a role and set-syncs its permissions. `None` when missing.
    async fn update_role(&self, role_id: i64, changes: RoleChanges)
    -> AppResult<Option<RoleRecord>>;

    /// Deletes a role after detaching its links.
    async fn delete_role(&self, role_id: i64) -> AppResult<bool>;
}

/// Repository port for groups and their role sets.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Executes a group list query.
    async fn list_groups(&self, query: &EntityQuery<GroupRelation>)
    -> AppResult<Vec<GroupRecord>>;

    /// Finds one group by id or key.
    async fn find_group(
        &self,
        reference: &EntityRef,
        relations: &[GroupRelation],
    ) -> AppResult<Option<GroupRecord>>;

    /// Creates a group and links its roles.
    async fn create_group(&self, input: NewGroup) -> AppResult<GroupRecord>;

    /// Updates a group and set-syncs its roles. `None` when missing.
    async fn update_group(
        &self,
        group_id: i64,
        changes: GroupChanges,
    ) -> AppResult<Option<GroupRecord>>;

    /// Deletes a group after detaching its links.
    async fn delete_group(&self, group_id: i64) -> AppResult<bool>;
}

/// Repository port for polymorphic subject links and authorization lookups.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Resolves keys of one record kind to `(id, key)` pairs. Unknown keys are omitted.
    async fn resolve_keys(&self, kind: AccessKind, keys: &[String])
    -> AppResult<Vec<(i64, String)>>;

    /// Links ids to a subject, skipping links that already exist.
    ///
    /// Returns the number of links created.
    async fn attach(&self, kind: AssignmentKind, subject: &SubjectRef, ids: &[i64])
    -> AppResult<u64>;

    /// Unlinks ids from a subject. Returns the number of links removed.
    async fn detach(&self, kind: AssignmentKind, subject: &SubjectRef, ids: &[i64])
    -> AppResult<u64>;

    /// Lists roles linked directly to a subject.
    async fn subject_roles(&self, subject: &SubjectRef) -> AppResult<Vec<Role>>;

    /// Lists permissions linked directly to a subject.
    async fn subject_permissions(&self, subject: &SubjectRef) -> AppResult<Vec<Permission>>;

    /// Lists groups a subject belongs to.
    async fn subject_groups(&self, subject: &SubjectRef) -> AppResult<Vec<Group>>;

    /// Checks for a direct link to the record with `key`.
    async fn has_assignment(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool>;

    /// Checks for a role held directly or through an active group.
    async fn has_effective_role(&self, subject: &SubjectRef, key: &str) -> AppResult<bool>;

    /// Checks for a permission held directly, through a role, or through a
    /// role of an active group.
    async fn has_effective_permission(&self, subject: &SubjectRef, key: &str) -> AppResult<bool>;

    /// Lists effective permissions with their guards, without duplicates.
    async fn effective_permissions(&self, subject: &SubjectRef)
    -> AppResult<Vec<GuardedPermission>>;
}
