use rolegate_core::SubjectRef;
use rolegate_domain::{Group, Permission, PermissionGuard, Role};
use serde::{Deserialize, Serialize};

/// Guard with optionally attached relations. `None` means not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRecord {
    /// The guard.
    pub guard: PermissionGuard,
    /// Owned permissions.
    pub permissions: Option<Vec<Permission>>,
}

/// Permission with optionally attached relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// The permission.
    pub permission: Permission,
    /// Owning guard.
    pub guard: Option<PermissionGuard>,
    /// Roles granting the permission.
    pub roles: Option<Vec<Role>>,
}

/// Role with optionally attached relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// The role.
    pub role: Role,
    /// Granted permissions.
    pub permissions: Option<Vec<Permission>>,
    /// Groups holding the role.
    pub groups: Option<Vec<Group>>,
}

/// Group with optionally attached relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// The group.
    pub group: Group,
    /// Roles held by the group.
    pub roles: Option<Vec<Role>>,
    /// Member subjects.
    pub members: Option<Vec<SubjectRef>>,
}

impl GuardRecord {
    /// Wraps a guard without relations.
    #[must_use]
    pub fn bare(guard: PermissionGuard) -> Self {
        Self {
            guard,
            permissions: None,
        }
    }
}

impl PermissionRecord {
    /// Wraps a permission without relations.
    #[must_use]
    pub fn bare(permission: Permission) -> Self {
        Self {
            permission,
            guard: None,
            roles: None,
        }
    }
}

impl RoleRecord {
    /// Wraps a role without relations.
    #[must_use]
    pub fn bare(role: Role) -> Self {
        Self {
            role,
            permissions: None,
            groups: None,
        }
    }
}

impl GroupRecord {
    /// Wraps a group without relations.
    #[must_use]
    pub fn bare(group: Group) -> Self {
        Self {
            group,
            roles: None,
            members: None,
        }
    }
}
