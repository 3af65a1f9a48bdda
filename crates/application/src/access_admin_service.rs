use std::sync::Arc;

use rolegate_core::AppResult;
use rolegate_domain::{AccessKind, EntityRef, validate_key};

use crate::reference_resolution::resolve_reference_ids;
use crate::{
    AssignmentRepository, GroupRepository, PermissionGuardRepository, PermissionRepository,
    RoleRepository,
};

mod groups;
mod guards;
mod permissions;
mod roles;

#[cfg(test)]
mod tests;

/// Repository handles shared by the access-control services.
#[derive(Clone)]
pub struct AccessRepositories {
    /// Guard storage.
    pub guards: Arc<dyn PermissionGuardRepository>,
    /// Permission storage.
    pub permissions: Arc<dyn PermissionRepository>,
    /// Role storage.
    pub roles: Arc<dyn RoleRepository>,
    /// Group storage.
    pub groups: Arc<dyn GroupRepository>,
    /// Subject link storage.
    pub assignments: Arc<dyn AssignmentRepository>,
}

impl AccessRepositories {
    /// Uses one implementation for every port.
    #[must_use]
    pub fn from_shared<R>(repository: Arc<R>) -> Self
    where
        R: PermissionGuardRepository
            + PermissionRepository
            + RoleRepository
            + GroupRepository
            + AssignmentRepository
            + 'static,
    {
        Self {
            guards: repository.clone(),
            permissions: repository.clone(),
            roles: repository.clone(),
            groups: repository.clone(),
            assignments: repository,
        }
    }
}

/// Application service for guard, permission, role and group administration.
#[derive(Clone)]
pub struct AccessAdminService {
    repositories: AccessRepositories,
}

impl AccessAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(repositories: AccessRepositories) -> Self {
        Self { repositories }
    }

    async fn resolve_ids(&self, kind: AccessKind, references: &[EntityRef]) -> AppResult<Vec<i64>> {
        resolve_reference_ids(self.repositories.assignments.as_ref(), kind, references).await
    }
}

fn validate_optional_key(key: Option<String>) -> AppResult<Option<String>> {
    key.as_deref().map(validate_key).transpose()
}
