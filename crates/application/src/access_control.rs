use std::sync::Arc;

use rolegate_core::AppResult;

use crate::{
    AccessAdminService, AccessRepositories, AssignmentRepository, GroupRepository,
    PermissionGates, PermissionGuardRepository, PermissionRepository, RoleRepository,
    SubjectAccessService,
};

/// Entry point bundling administration, subject checks and gate registration.
#[derive(Clone)]
pub struct AccessControl {
    repositories: AccessRepositories,
    admin: AccessAdminService,
    subjects: SubjectAccessService,
}

impl AccessControl {
    /// Builds the services over explicit repository handles.
    #[must_use]
    pub fn new(repositories: AccessRepositories) -> Self {
        Self {
            admin: AccessAdminService::new(repositories.clone()),
            subjects: SubjectAccessService::new(repositories.assignments.clone()),
            repositories,
        }
    }

    /// Builds the services over one implementation of every port.
    #[must_use]
    pub fn from_repository<R>(repository: Arc<R>) -> Self
    where
        R: PermissionGuardRepository
            + PermissionRepository
            + RoleRepository
            + GroupRepository
            + AssignmentRepository
            + 'static,
    {
        Self::new(AccessRepositories::from_shared(repository))
    }

    /// Guard, permission, role and group administration.
    #[must_use]
    pub fn admin(&self) -> &AccessAdminService {
        &self.admin
    }

    /// Subject links and authorization checks.
    #[must_use]
    pub fn subjects(&self) -> &SubjectAccessService {
        &self.subjects
    }

    /// Registers one gate per stored permission.
    pub async fn register_gates(&self) -> AppResult<PermissionGates> {
        PermissionGates::register(
            self.repositories.permissions.as_ref(),
            self.subjects.clone(),
        )
        .await
    }
}
