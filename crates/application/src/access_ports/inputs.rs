use rolegate_domain::{EntityRef, TranslatableText};
use serde::{Deserialize, Serialize};

/// Permission payload nested in guard writes.
///
/// On update the payload matches an existing permission of the guard by
/// `id` when present, otherwise by `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardPermissionInput {
    /// Existing permission id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Permission key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
}

/// Input payload for creating a guard and its permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGuardInput {
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Permissions created under the guard.
    #[serde(default)]
    pub permissions: Vec<GuardPermissionInput>,
}

/// Input payload for updating a guard and upserting permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGuardInput {
    /// New key.
    #[serde(default)]
    pub key: Option<String>,
    /// New display name.
    #[serde(default)]
    pub name: Option<TranslatableText>,
    /// Permissions upserted under the guard.
    #[serde(default)]
    pub permissions: Vec<GuardPermissionInput>,
}

/// Input payload for creating a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoleInput {
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Permission references, all ids or all keys.
    #[serde(default)]
    pub permissions: Vec<EntityRef>,
}

/// Input payload for updating a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRoleInput {
    /// New key.
    #[serde(default)]
    pub key: Option<String>,
    /// New display name.
    #[serde(default)]
    pub name: Option<TranslatableText>,
    /// Replacement permission set; `None` leaves permissions untouched.
    #[serde(default)]
    pub permissions: Option<Vec<EntityRef>>,
}

/// Input payload for creating a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupInput {
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Optional description per locale.
    #[serde(default)]
    pub description: Option<TranslatableText>,
    /// Whether the group grants its roles.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Role references, all ids or all keys.
    #[serde(default)]
    pub roles: Vec<EntityRef>,
}

/// Input payload for updating a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroupInput {
    /// New key.
    #[serde(default)]
    pub key: Option<String>,
    /// New display name.
    #[serde(default)]
    pub name: Option<TranslatableText>,
    /// New description.
    #[serde(default)]
    pub description: Option<TranslatableText>,
    /// New activation flag.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Replacement role set; `None` leaves roles untouched.
    #[serde(default)]
    pub roles: Option<Vec<EntityRef>>,
}

fn default_active() -> bool {
    true
}

/// Role write with permission references resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Validated key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Permission ids linked to the role.
    pub permission_ids: Vec<i64>,
}

/// Role update with permission references resolved to ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleChanges {
    /// New key.
    pub key: Option<String>,
    /// New display name.
    pub name: Option<TranslatableText>,
    /// Replacement permission ids.
    pub permission_ids: Option<Vec<i64>>,
}

/// Group write with role references resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    /// Validated key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Optional description.
    pub description: Option<TranslatableText>,
    /// Activation flag.
    pub is_active: bool,
    /// Role ids linked to the group.
    pub role_ids: Vec<i64>,
}

/// Group update with role references resolved to ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupChanges {
    /// New key.
    pub key: Option<String>,
    /// New display name.
    pub name: Option<TranslatableText>,
    /// New description.
    pub description: Option<TranslatableText>,
    /// New activation flag.
    pub is_active: Option<bool>,
    /// Replacement role ids.
    pub role_ids: Option<Vec<i64>>,
}
