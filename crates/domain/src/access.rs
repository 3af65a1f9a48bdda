use chrono::{DateTime, Utc};
use rolegate_core::{AppResult, NonEmptyString, SubjectRef};
use serde::{Deserialize, Serialize};

use crate::reference::EntityRef;
use crate::translation::{Translatable, TranslatableText};

/// Kinds of access-control records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    /// Named bucket of permissions.
    PermissionGuard,
    /// Single permission owned by a guard.
    Permission,
    /// Named set of permissions.
    Role,
    /// Named set of members and roles.
    Group,
}

impl AccessKind {
    /// Returns a stable label for messages and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionGuard => "permission_guard",
            Self::Permission => "permission",
            Self::Role => "role",
            Self::Group => "group",
        }
    }
}

/// Links a subject can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Subject holds a role.
    Role,
    /// Subject holds a permission directly.
    Permission,
    /// Subject is a group member.
    Group,
}

impl AssignmentKind {
    /// Returns the record kind on the far side of the link.
    #[must_use]
    pub fn target(&self) -> AccessKind {
        match self {
            Self::Role => AccessKind::Role,
            Self::Permission => AccessKind::Permission,
            Self::Group => AccessKind::Group,
        }
    }
}

/// Validates and normalizes a record key.
pub fn validate_key(key: &str) -> AppResult<String> {
    let key = NonEmptyString::new(key.trim())?;
    Ok(key.into())
}

/// Named bucket grouping permissions, such as `posts` or `billing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGuard {
    /// Surrogate id.
    pub id: i64,
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Permission owned by exactly one guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Surrogate id.
    pub id: i64,
    /// Unique key, also the gate name.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Owning guard id.
    pub permission_guard_id: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Role granting a set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Surrogate id.
    pub id: i64,
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Internal subject kind under which role links are stored.
    pub const SUBJECT_KIND: &'static str = "role";

    /// Returns the internal subject used to store this role's permission links.
    #[must_use]
    pub fn subject_for(role_id: i64) -> SubjectRef {
        SubjectRef::internal(Self::SUBJECT_KIND, role_id)
    }
}

/// Group of member subjects that also holds roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Surrogate id.
    pub id: i64,
    /// Unique key.
    pub key: String,
    /// Display name per locale.
    pub name: TranslatableText,
    /// Optional description per locale.
    pub description: Option<TranslatableText>,
    /// Inactive groups keep members but grant nothing.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Internal subject kind under which group role links are stored.
    pub const SUBJECT_KIND: &'static str = "group";

    /// Returns the internal subject used to store this group's role links.
    #[must_use]
    pub fn subject_for(group_id: i64) -> SubjectRef {
        SubjectRef::internal(Self::SUBJECT_KIND, group_id)
    }
}

macro_rules! name_translatable {
    ($($record:ty),+) => {
        $(
            impl Translatable for $record {
                const TRANSLATABLE: &'static [&'static str] = &["name"];

                fn translation_field(&self, attribute: &str) -> Option<&TranslatableText> {
                    (attribute == "name").then_some(&self.name)
                }
            }

            impl From<&$record> for EntityRef {
                fn from(record: &$record) -> Self {
                    EntityRef::Id(record.id)
                }
            }
        )+
    };
}

name_translatable!(PermissionGuard, Permission, Role);

impl Translatable for Group {
    const TRANSLATABLE: &'static [&'static str] = &["name", "description"];

    fn translation_field(&self, attribute: &str) -> Option<&TranslatableText> {
        match attribute {
            "name" => Some(&self.name),
            "description" => self.description.as_ref(),
            _ => None,
        }
    }
}

impl From<&Group> for EntityRef {
    fn from(record: &Group) -> Self {
        EntityRef::Id(record.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Group, Role, validate_key};
    use crate::reference::EntityRef;
    use crate::translation::{LocaleFallback, TranslatableText, resolve_translatable};

    fn group() -> Group {
        Group {
            id: 3,
            key: "team".to_owned(),
            name: TranslatableText::from([("en", "Team"), ("ar", "فريق")]),
            description: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn keys_are_trimmed_and_required() {
        assert_eq!(validate_key("  editor ").unwrap_or_default(), "editor");
        assert!(validate_key("   ").is_err());
    }

    #[test]
    fn group_description_is_optional_translatable() {
        let mut group = group();
        let fallback = LocaleFallback::default();
        assert_eq!(
            resolve_translatable(&group, "description", "en", &fallback),
            None
        );

        group.description = Some(TranslatableText::from([("ar", "الوصف")]));
        assert_eq!(
            resolve_translatable(&group, "description", "en", &fallback),
            Some("الوصف")
        );
        assert_eq!(resolve_translatable(&group, "name", "ar", &fallback), Some("فريق"));
    }

    #[test]
    fn records_convert_to_id_references() {
        assert_eq!(EntityRef::from(&group()), EntityRef::Id(3));
        assert_eq!(Role::subject_for(5).to_string(), "rolegate:role:5");
    }
}
