//! Domain records, translation resolution and assignment invariants.

#![forbid(unsafe_code)]

mod access;
mod grouping;
mod reference;
mod sync;
mod translation;

pub use access::{
    AccessKind, AssignmentKind, Group, Permission, PermissionGuard, Role, validate_key,
};
pub use grouping::{
    GROUPED_NAME_LOCALES, GroupedPermission, GuardPermissionGroup, GuardedPermission,
    group_permissions_by_guard,
};
pub use reference::{EntityRef, ReferenceSet, ensure_keys_resolved};
pub use sync::SyncPlan;
pub use translation::{
    DEFAULT_LANGUAGES, LocaleFallback, Translatable, TranslatableText, resolve_translatable,
};
