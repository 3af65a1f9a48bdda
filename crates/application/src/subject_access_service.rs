use std::sync::Arc;

use rolegate_core::{AppResult, SubjectRef};
use rolegate_domain::{
    AssignmentKind, EntityRef, Group, GuardPermissionGroup, GuardedPermission, Permission, Role,
    group_permissions_by_guard,
};

use crate::AssignmentRepository;
use crate::reference_resolution::{resolve_existing_ids, resolve_reference_ids};

#[cfg(test)]
mod tests;

/// Subject whose permission set is either loaded or not.
///
/// Read models built from it never fetch on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSubject {
    subject: SubjectRef,
    permissions: Option<Vec<GuardedPermission>>,
}

impl AccessSubject {
    /// Wraps a subject without loaded permissions.
    #[must_use]
    pub fn new(subject: SubjectRef) -> Self {
        Self {
            subject,
            permissions: None,
        }
    }

    /// Wraps a subject with an already loaded permission set.
    #[must_use]
    pub fn with_permissions(subject: SubjectRef, permissions: Vec<GuardedPermission>) -> Self {
        Self {
            subject,
            permissions: Some(permissions),
        }
    }

    /// Returns the wrapped subject.
    #[must_use]
    pub fn subject(&self) -> &SubjectRef {
        &self.subject
    }

    /// Returns the loaded permissions, if any.
    #[must_use]
    pub fn permissions(&self) -> Option<&[GuardedPermission]> {
        self.permissions.as_deref()
    }

    /// Returns whether the permission set was loaded.
    #[must_use]
    pub fn permissions_loaded(&self) -> bool {
        self.permissions.is_some()
    }

    /// Groups loaded permissions by guard; empty when nothing was loaded.
    #[must_use]
    pub fn grouped_permissions_by_guard(&self) -> Vec<GuardPermissionGroup> {
        self.permissions
            .as_deref()
            .map(group_permissions_by_guard)
            .unwrap_or_default()
    }
}

/// Application service exposing role, permission and group links of subjects.
#[derive(Clone)]
pub struct SubjectAccessService {
    repository: Arc<dyn AssignmentRepository>,
}

impl SubjectAccessService {
    /// Creates a new service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AssignmentRepository>) -> Self {
        Self { repository }
    }

    /// Lists groups the subject belongs to.
    pub async fn groups(&self, subject: &SubjectRef) -> AppResult<Vec<Group>> {
        self.repository.subject_groups(subject).await
    }

    /// Adds the subject to every referenced group it is not in yet.
    pub async fn assign_to_groups(
        &self,
        subject: &SubjectRef,
        groups: &[EntityRef],
    ) -> AppResult<()> {
        self.assign(AssignmentKind::Group, subject, groups).await
    }

    /// Removes the subject from the referenced groups.
    pub async fn remove_from_groups(
        &self,
        subject: &SubjectRef,
        groups: &[EntityRef],
    ) -> AppResult<()> {
        self.unassign(AssignmentKind::Group, subject, groups).await
    }

    /// Lists roles linked directly to the subject.
    pub async fn roles(&self, subject: &SubjectRef) -> AppResult<Vec<Role>> {
        self.repository.subject_roles(subject).await
    }

    /// Grants every referenced role the subject does not hold yet.
    pub async fn assign_role(&self, subject: &SubjectRef, roles: &[EntityRef]) -> AppResult<()> {
        self.assign(AssignmentKind::Role, subject, roles).await
    }

    /// Removes the referenced roles from the subject.
    pub async fn remove_role(&self, subject: &SubjectRef, roles: &[EntityRef]) -> AppResult<()> {
        self.unassign(AssignmentKind::Role, subject, roles).await
    }

    /// Lists permissions linked directly to the subject.
    pub async fn permissions(&self, subject: &SubjectRef) -> AppResult<Vec<Permission>> {
        self.repository.subject_permissions(subject).await
    }

    /// Grants every referenced permission the subject does not hold yet.
    pub async fn give_permission_to(
        &self,
        subject: &SubjectRef,
        permissions: &[EntityRef],
    ) -> AppResult<()> {
        self.assign(AssignmentKind::Permission, subject, permissions)
            .await
    }

    /// Revokes the referenced permissions from the subject.
    pub async fn revoke_permission_to(
        &self,
        subject: &SubjectRef,
        permissions: &[EntityRef],
    ) -> AppResult<()> {
        self.unassign(AssignmentKind::Permission, subject, permissions)
            .await
    }

    /// Returns whether the role is linked directly to the subject.
    pub async fn has_role(&self, subject: &SubjectRef, role_key: &str) -> AppResult<bool> {
        self.repository
            .has_assignment(AssignmentKind::Role, subject, role_key)
            .await
    }

    /// Returns whether the subject holds the role directly or through an active group.
    pub async fn holds_role(&self, subject: &SubjectRef, role_key: &str) -> AppResult<bool> {
        self.repository.has_effective_role(subject, role_key).await
    }

    /// Returns whether the subject holds the permission directly, through a
    /// role, or through a role of an active group.
    pub async fn has_permission_to(
        &self,
        subject: &SubjectRef,
        permission_key: &str,
    ) -> AppResult<bool> {
        self.repository
            .has_effective_permission(subject, permission_key)
            .await
    }

    /// Returns whether the subject is a member of the group.
    pub async fn in_group(&self, subject: &SubjectRef, group_key: &str) -> AppResult<bool> {
        self.repository
            .has_assignment(AssignmentKind::Group, subject, group_key)
            .await
    }

    /// Loads the subject's effective permissions with their guards.
    pub async fn load_permissions(&self, subject: &SubjectRef) -> AppResult<AccessSubject> {
        let permissions = self.repository.effective_permissions(subject).await?;
        Ok(AccessSubject::with_permissions(subject.clone(), permissions))
    }

    async fn assign(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        references: &[EntityRef],
    ) -> AppResult<()> {
        let ids = resolve_reference_ids(self.repository.as_ref(), kind.target(), references).await?;
        if ids.is_empty() {
            return Ok(());
        }

        self.repository.attach(kind, subject, &ids).await.map(|_| ())
    }

    async fn unassign(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        references: &[EntityRef],
    ) -> AppResult<()> {
        let ids = resolve_existing_ids(self.repository.as_ref(), kind.target(), references).await?;
        if ids.is_empty() {
            return Ok(());
        }

        self.repository.detach(kind, subject, &ids).await.map(|_| ())
    }
}
