use serde::{Deserialize, Serialize};

use crate::access::{Permission, PermissionGuard};

/// Locales tried, in order, for names in the grouped read model.
pub const GROUPED_NAME_LOCALES: [&str; 2] = ["ar", "en"];

/// Permission paired with its owning guard, when that guard could be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedPermission {
    /// The permission.
    pub permission: Permission,
    /// Owning guard.
    pub guard: Option<PermissionGuard>,
}

/// One permission entry of a guard group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedPermission {
    /// Permission key.
    pub key: String,
    /// Resolved display name.
    pub name: Option<String>,
}

/// Permissions sharing one guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardPermissionGroup {
    /// Guard key, absent for permissions without a resolvable guard.
    pub key: Option<String>,
    /// Resolved guard display name.
    pub name: Option<String>,
    /// Permissions in first-seen order.
    pub permissions: Vec<GroupedPermission>,
}

/// Groups permissions by guard key in first-seen order.
#[must_use]
pub fn group_permissions_by_guard(permissions: &[GuardedPermission]) -> Vec<GuardPermissionGroup> {
    let mut groups: Vec<GuardPermissionGroup> = Vec::new();

    for entry in permissions {
        let guard_key = entry.guard.as_ref().map(|guard| guard.key.clone());
        let grouped = GroupedPermission {
            key: entry.permission.key.clone(),
            name: entry
                .permission
                .name
                .get_any(&GROUPED_NAME_LOCALES)
                .map(str::to_owned),
        };

        match groups.iter_mut().find(|group| group.key == guard_key) {
            Some(group) => group.permissions.push(grouped),
            None => groups.push(GuardPermissionGroup {
                key: guard_key,
                name: entry
                    .guard
                    .as_ref()
                    .and_then(|guard| guard.name.get_any(&GROUPED_NAME_LOCALES))
                    .map(str::to_owned),
                permissions: vec![grouped],
            }),
        }
    }

    groups.retain(|group| !group.permissions.is_empty());
    groups
}
