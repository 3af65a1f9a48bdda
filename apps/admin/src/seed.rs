use std::path::Path;

use rolegate_application::{
    AccessControl, CreateGroupInput, CreateGuardInput, CreateRoleInput, UpdateGroupInput,
    UpdateGuardInput, UpdateRoleInput,
};
use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::EntityRef;
use serde::Deserialize;
use tracing::info;

/// Declarative access-control content loaded from JSON.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub guards: Vec<CreateGuardInput>,
    #[serde(default)]
    pub roles: Vec<CreateRoleInput>,
    #[serde(default)]
    pub groups: Vec<CreateGroupInput>,
    #[serde(default)]
    pub assignments: Vec<SeedAssignment>,
}

/// Links granted to one subject.
#[derive(Debug, Deserialize)]
pub struct SeedAssignment {
    pub subject_type: String,
    pub subject_id: i64,
    #[serde(default)]
    pub roles: Vec<EntityRef>,
    #[serde(default)]
    pub permissions: Vec<EntityRef>,
    #[serde(default)]
    pub groups: Vec<EntityRef>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub updated: usize,
    pub subjects: usize,
}

impl SeedFile {
    pub async fn read(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::Validation(format!("failed to read seed file '{}': {error}", path.display()))
        })?;

        serde_json::from_str(raw.as_str()).map_err(|error| {
            AppError::Validation(format!("invalid seed file '{}': {error}", path.display()))
        })
    }
}

/// Applies a seed file; records that already exist are updated in place.
pub async fn apply(access: &AccessControl, seed: SeedFile) -> AppResult<SeedSummary> {
    let admin = access.admin();
    let mut summary = SeedSummary::default();

    for guard in seed.guards {
        match admin.show_guard(EntityRef::key(guard.key.as_str()), &[]).await? {
            Some(existing) => {
                admin
                    .update_guard(
                        existing.guard.id,
                        UpdateGuardInput {
                            key: None,
                            name: Some(guard.name),
                            permissions: guard.permissions,
                        },
                    )
                    .await?;
                summary.updated += 1;
            }
            None => {
                admin.create_guard(guard).await?;
                summary.created += 1;
            }
        }
    }

    for role in seed.roles {
        match admin.show_role(EntityRef::key(role.key.as_str()), &[]).await? {
            Some(existing) => {
                admin
                    .update_role(
                        existing.role.id,
                        UpdateRoleInput {
                            key: None,
                            name: Some(role.name),
                            permissions: Some(role.permissions),
                        },
                    )
                    .await?;
                summary.updated += 1;
            }
            None => {
                admin.create_role(role).await?;
                summary.created += 1;
            }
        }
    }

    for group in seed.groups {
        match admin.show_group(EntityRef::key(group.key.as_str()), &[]).await? {
            Some(existing) => {
                admin
                    .update_group(
                        existing.group.id,
                        UpdateGroupInput {
                            key: None,
                            name: Some(group.name),
                            description: group.description,
                            is_active: Some(group.is_active),
                            roles: Some(group.roles),
                        },
                    )
                    .await?;
                summary.updated += 1;
            }
            None => {
                admin.create_group(group).await?;
                summary.created += 1;
            }
        }
    }

    let subjects = access.subjects();
    for assignment in seed.assignments {
        let subject = SubjectRef::new(assignment.subject_type, assignment.subject_id)?;
        subjects.assign_role(&subject, &assignment.roles).await?;
        subjects
            .give_permission_to(&subject, &assignment.permissions)
            .await?;
        subjects
            .assign_to_groups(&subject, &assignment.groups)
            .await?;
        summary.subjects += 1;
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        subjects = summary.subjects,
        "seed applied"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rolegate_application::AccessControl;
    use rolegate_core::SubjectRef;
    use rolegate_infrastructure::InMemoryAccessRepository;

    use super::{SeedFile, SeedSummary, apply};

    const SEED: &str = r#"{
        "guards": [
            {
                "key": "posts",
                "name": { "en": "Posts", "ar": "المقالات" },
                "permissions": [
                    { "key": "edit-post", "name": { "en": "Edit" } },
                    { "key": "delete-post", "name": { "en": "Delete" } }
                ]
            }
        ],
        "roles": [
            { "key": "editor", "name": { "en": "Editor" }, "permissions": ["edit-post"] }
        ],
        "groups": [
            { "key": "team", "name": { "en": "Team" }, "roles": ["editor"] }
        ],
        "assignments": [
            { "subject_type": "user", "subject_id": 1, "groups": ["team"] },
            { "subject_type": "user", "subject_id": 2, "permissions": ["delete-post"] }
        ]
    }"#;

    fn seed() -> SeedFile {
        serde_json::from_str(SEED).unwrap_or_else(|error| panic!("seed should parse: {error}"))
    }

    #[tokio::test]
    async fn seeding_twice_updates_instead_of_duplicating() {
        let access = AccessControl::from_repository(Arc::new(InMemoryAccessRepository::new()));

        let first = apply(&access, seed()).await;
        assert_eq!(
            first.ok(),
            Some(SeedSummary {
                created: 3,
                updated: 0,
                subjects: 2,
            })
        );

        let second = apply(&access, seed()).await;
        assert_eq!(
            second.ok(),
            Some(SeedSummary {
                created: 0,
                updated: 3,
                subjects: 2,
            })
        );

        let member = SubjectRef::new("user", 1).unwrap_or_else(|_| unreachable!());
        let subjects = access.subjects();
        assert!(subjects.in_group(&member, "team").await.unwrap_or_default());
        assert!(subjects.has_permission_to(&member, "edit-post").await.unwrap_or_default());
        assert_eq!(subjects.groups(&member).await.map(|groups| groups.len()).ok(), Some(1));
    }

    #[test]
    fn numeric_references_parse_as_ids() {
        let parsed: Result<SeedFile, _> = serde_json::from_str(
            r#"{ "roles": [{ "key": "viewer", "name": {}, "permissions": [1, "2"] }] }"#,
        );
        let permissions = parsed
            .ok()
            .and_then(|seed| seed.roles.into_iter().next())
            .map(|role| role.permissions)
            .unwrap_or_default();

        assert_eq!(
            permissions,
            vec![
                rolegate_domain::EntityRef::Id(1),
                rolegate_domain::EntityRef::Id(2)
            ]
        );
    }
}
