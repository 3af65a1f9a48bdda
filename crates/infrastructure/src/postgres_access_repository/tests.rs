use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use rolegate_application::{
    AccessControl, CreateGroupInput, CreateGuardInput, CreateRoleInput, GroupRelation,
    GuardPermissionInput, GuardRelation, UpdateGroupInput,
};
use rolegate_core::{AppError, SubjectRef};
use rolegate_domain::{EntityRef, TranslatableText};

use super::PostgresAccessRepository;
use crate::schema::{SchemaNames, TableNames};

static NEXT_SCHEMA: AtomicUsize = AtomicUsize::new(0);

async fn test_access_control() -> Option<AccessControl> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    let prefix = format!(
        "t{}_{}",
        Utc::now().timestamp_micros(),
        NEXT_SCHEMA.fetch_add(1, Ordering::Relaxed)
    );
    let names = SchemaNames {
        tables: TableNames {
            permission_guards: format!("{prefix}_guards"),
            permissions: format!("{prefix}_permissions"),
            roles: format!("{prefix}_roles"),
            groups: format!("{prefix}_groups"),
            role_assignments: format!("{prefix}_role_links"),
            permission_assignments: format!("{prefix}_permission_links"),
            groupables: format!("{prefix}_groupables"),
        },
        ..SchemaNames::default()
    };

    let repository = match PostgresAccessRepository::with_names(pool, names) {
        Ok(repository) => repository,
        Err(error) => panic!("invalid test schema names: {error}"),
    };

    if let Err(error) = repository.install_schema().await {
        panic!("failed to install schema for postgres access tests: {error}");
    }

    Some(AccessControl::from_repository(Arc::new(repository)))
}

fn user(id: i64) -> SubjectRef {
    SubjectRef::new("user", id).unwrap_or_else(|_| unreachable!())
}

async fn seed_posts_guard(access: &AccessControl) {
    let created = access
        .admin()
        .create_guard(CreateGuardInput {
            key: "posts".to_owned(),
            name: TranslatableText::from([("en", "Posts"), ("ar", "المقالات")]),
            permissions: vec![
                GuardPermissionInput {
                    id: None,
                    key: "edit-post".to_owned(),
                    name: TranslatableText::from([("en", "Edit post")]),
                },
                GuardPermissionInput {
                    id: None,
                    key: "delete-post".to_owned(),
                    name: TranslatableText::from([("en", "Delete post")]),
                },
            ],
        })
        .await;

    assert!(created.is_ok());
}

#[tokio::test]
async fn role_grants_permission_to_subject() {
    let Some(access) = test_access_control().await else {
        return;
    };
    seed_posts_guard(&access).await;

    let role = access
        .admin()
        .create_role(CreateRoleInput {
            key: "editor".to_owned(),
            name: TranslatableText::from([("en", "Editor")]),
            permissions: vec![EntityRef::key("edit-post")],
        })
        .await;
    assert!(role.is_ok_and(|record| record.permissions.is_some_and(|list| list.len() == 1)));

    let alice = user(1);
    let subjects = access.subjects();
    assert!(subjects.assign_role(&alice, &[EntityRef::key("editor")]).await.is_ok());
    assert!(subjects.assign_role(&alice, &[EntityRef::key("editor")]).await.is_ok());

    assert_eq!(subjects.roles(&alice).await.map(|roles| roles.len()).unwrap_or_default(), 1);
    assert!(subjects.has_role(&alice, "editor").await.unwrap_or_default());
    assert!(!subjects.has_role(&alice, "viewer").await.unwrap_or(true));
    assert!(subjects.has_permission_to(&alice, "edit-post").await.unwrap_or_default());
    assert!(!subjects.has_permission_to(&alice, "delete-post").await.unwrap_or(true));

    let loaded = subjects.load_permissions(&alice).await;
    let grouped = loaded
        .map(|subject| subject.grouped_permissions_by_guard())
        .unwrap_or_default();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].key.as_deref(), Some("posts"));
    assert_eq!(grouped[0].name.as_deref(), Some("المقالات"));
}

#[tokio::test]
async fn active_group_roles_reach_members() {
    let Some(access) = test_access_control().await else {
        return;
    };
    seed_posts_guard(&access).await;

    let role = access
        .admin()
        .create_role(CreateRoleInput {
            key: "editor".to_owned(),
            name: TranslatableText::from([("en", "Editor")]),
            permissions: vec![EntityRef::key("edit-post")],
        })
        .await;
    assert!(role.is_ok());

    let group = access
        .admin()
        .create_group(CreateGroupInput {
            key: "team".to_owned(),
            name: TranslatableText::from([("en", "Team")]),
            description: None,
            is_active: true,
            roles: vec![EntityRef::key("editor")],
        })
        .await;
    let Ok(group) = group else {
        panic!("group should be created");
    };

    let bob = user(2);
    let subjects = access.subjects();
    assert!(subjects.assign_to_groups(&bob, &[EntityRef::key("team")]).await.is_ok());
    assert!(subjects.in_group(&bob, "team").await.unwrap_or_default());
    assert!(!subjects.has_role(&bob, "editor").await.unwrap_or(true));
    assert!(subjects.holds_role(&bob, "editor").await.unwrap_or_default());
    assert!(subjects.has_permission_to(&bob, "edit-post").await.unwrap_or_default());

    let deactivated = access
        .admin()
        .update_group(
            group.group.id,
            UpdateGroupInput {
                is_active: Some(false),
                ..UpdateGroupInput::default()
            },
        )
        .await;
    assert!(deactivated.is_ok_and(|record| record.is_some_and(|record| !record.group.is_active)));
    assert!(!subjects.has_permission_to(&bob, "edit-post").await.unwrap_or(true));

    assert!(subjects.remove_from_groups(&bob, &[EntityRef::key("team")]).await.is_ok());
    assert!(!subjects.in_group(&bob, "team").await.unwrap_or(true));
}

#[tokio::test]
async fn deleting_guard_removes_assignments() {
    let Some(access) = test_access_control().await else {
        return;
    };
    seed_posts_guard(&access).await;

    let carol = user(3);
    let subjects = access.subjects();
    assert!(
        subjects
            .give_permission_to(&carol, &[EntityRef::key("delete-post")])
            .await
            .is_ok()
    );

    let guard = access.admin().show_guard("posts", &[GuardRelation::Permissions]).await;
    let Ok(Some(guard)) = guard else {
        panic!("guard should exist");
    };
    assert_eq!(guard.permissions.map(|list| list.len()), Some(2));

    assert!(access.admin().delete_guard(guard.guard.id).await.unwrap_or_default());
    assert!(!access.admin().delete_guard(guard.guard.id).await.unwrap_or(true));
    assert!(
        subjects
            .permissions(&carol)
            .await
            .is_ok_and(|permissions| permissions.is_empty())
    );
}

#[tokio::test]
async fn duplicate_keys_and_unknown_references_are_reported() {
    let Some(access) = test_access_control().await else {
        return;
    };
    seed_posts_guard(&access).await;

    let duplicate = access
        .admin()
        .create_guard(CreateGuardInput {
            key: "posts".to_owned(),
            name: TranslatableText::new(),
            permissions: Vec::new(),
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let dangling = access
        .admin()
        .create_role(CreateRoleInput {
            key: "ghost".to_owned(),
            name: TranslatableText::new(),
            permissions: vec![EntityRef::Id(987_654)],
        })
        .await;
    assert!(matches!(dangling, Err(AppError::NotFound(_))));
    assert!(
        access
            .admin()
            .show_role("ghost", &[])
            .await
            .is_ok_and(|record| record.is_none())
    );
}

#[tokio::test]
async fn translations_keep_their_order() {
    let Some(access) = test_access_control().await else {
        return;
    };

    let name = TranslatableText::from([("en", "Admin"), ("ar", "مشرف")]);
    let created = access
        .admin()
        .create_role(CreateRoleInput {
            key: "admin".to_owned(),
            name: name.clone(),
            permissions: Vec::new(),
        })
        .await;
    assert!(created.is_ok());

    let shown = access.admin().show_role("admin", &[]).await;
    let Ok(Some(record)) = shown else {
        panic!("role should exist");
    };
    assert_eq!(record.role.name, name);
    assert_eq!(record.role.name.locales().collect::<Vec<_>>(), vec!["en", "ar"]);
}

#[tokio::test]
async fn deleting_role_and_group_removes_their_links() {
    let Some(access) = test_access_control().await else {
        return;
    };
    seed_posts_guard(&access).await;

    let role = access
        .admin()
        .create_role(CreateRoleInput {
            key: "editor".to_owned(),
            name: TranslatableText::from([("en", "Editor")]),
            permissions: vec![EntityRef::key("edit-post")],
        })
        .await;
    let Ok(role) = role else {
        panic!("editor role should be created");
    };
    let group = access
        .admin()
        .create_group(CreateGroupInput {
            key: "team".to_owned(),
            name: TranslatableText::from([("en", "Team")]),
            description: None,
            is_active: true,
            roles: vec![EntityRef::key("editor")],
        })
        .await;
    let Ok(group) = group else {
        panic!("team group should be created");
    };

    let direct = user(1);
    let member = user(2);
    let subjects = access.subjects();
    assert!(subjects.assign_role(&direct, &[EntityRef::key("editor")]).await.is_ok());
    assert!(subjects.assign_to_groups(&member, &[EntityRef::key("team")]).await.is_ok());
    assert!(subjects.has_permission_to(&member, "edit-post").await.unwrap_or_default());

    assert!(access.admin().delete_role(role.role.id).await.unwrap_or_default());
    assert!(!access.admin().delete_role(role.role.id).await.unwrap_or(true));
    assert!(!subjects.has_role(&direct, "editor").await.unwrap_or(true));
    assert!(subjects.roles(&direct).await.unwrap_or_default().is_empty());
    assert!(!subjects.has_permission_to(&direct, "edit-post").await.unwrap_or(true));
    assert!(!subjects.has_permission_to(&member, "edit-post").await.unwrap_or(true));

    let group_roles = access
        .admin()
        .show_group("team", &[GroupRelation::Roles])
        .await
        .ok()
        .flatten()
        .and_then(|record| record.roles)
        .map(|roles| roles.len());
    assert_eq!(group_roles, Some(0));

    assert!(access.admin().delete_group(group.group.id).await.unwrap_or_default());
    assert!(!access.admin().delete_group(group.group.id).await.unwrap_or(true));
    assert!(!subjects.in_group(&member, "team").await.unwrap_or(true));
    assert!(subjects.groups(&member).await.unwrap_or_default().is_empty());
}
