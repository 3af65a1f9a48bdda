use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::{
    AccessKind, AssignmentKind, EntityRef, Group, GuardedPermission, Permission, Role,
    TranslatableText,
};

use crate::access_ports::{
    CreateGuardInput, CreateRoleInput, EntityFilter, EntityQuery, GroupChanges, GroupRecord,
    GroupRelation, GuardRecord, GuardRelation, Listing, NewGroup, NewRole, PermissionRecord,
    PermissionRelation, RoleChanges, RoleRecord, RoleRelation, UpdateGuardInput, UpdateRoleInput,
};
use crate::{
    AssignmentRepository, GroupRepository, PermissionGuardRepository, PermissionRepository,
    RoleRepository,
};

use super::{AccessAdminService, AccessRepositories};

#[derive(Default)]
struct FakeRoleRepository {
    created: Mutex<Vec<NewRole>>,
    updated: Mutex<Vec<(i64, RoleChanges)>>,
    looked_up: Mutex<Vec<EntityRef>>,
    list_calls: Mutex<usize>,
}

fn role(id: i64, key: &str) -> Role {
    Role {
        id,
        key: key.to_owned(),
        name: TranslatableText::from([("en", key)]),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl RoleRepository for FakeRoleRepository {
    async fn list_roles(&self, _query: &EntityQuery<RoleRelation>) -> AppResult<Vec<RoleRecord>> {
        *self.list_calls.lock().await += 1;
        Ok(vec![RoleRecord::bare(role(1, "editor"))])
    }

    async fn find_role(
        &self,
        reference: &EntityRef,
        _relations: &[RoleRelation],
    ) -> AppResult<Option<RoleRecord>> {
        self.looked_up.lock().await.push(reference.clone());
        Ok(None)
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        let record = RoleRecord::bare(role(1, input.key.as_str()));
        self.created.lock().await.push(input);
        Ok(record)
    }

    async fn update_role(
        &self,
        role_id: i64,
        changes: RoleChanges,
    ) -> AppResult<Option<RoleRecord>> {
        self.updated.lock().await.push((role_id, changes));
        Ok(Some(RoleRecord::bare(role(role_id, "editor"))))
    }

    async fn delete_role(&self, _role_id: i64) -> AppResult<bool> {
        Ok(false)
    }
}

#[derive(Default)]
struct FakeGuardRepository {
    created: Mutex<Vec<CreateGuardInput>>,
}

#[async_trait]
impl PermissionGuardRepository for FakeGuardRepository {
    async fn list_guards(
        &self,
        _query: &EntityQuery<GuardRelation>,
    ) -> AppResult<Vec<GuardRecord>> {
        Ok(Vec::new())
    }

    async fn find_guard(
        &self,
        _reference: &EntityRef,
        _relations: &[GuardRelation],
    ) -> AppResult<Option<GuardRecord>> {
        Ok(None)
    }

    async fn create_guard(&self, input: CreateGuardInput) -> AppResult<GuardRecord> {
        self.created.lock().await.push(input);
        Err(AppError::Internal("guard persistence is not faked".to_owned()))
    }

    async fn update_guard(
        &self,
        _guard_id: i64,
        _input: UpdateGuardInput,
    ) -> AppResult<Option<GuardRecord>> {
        Ok(None)
    }

    async fn delete_guard(&self, _guard_id: i64) -> AppResult<bool> {
        Ok(false)
    }
}

struct UnusedRepository;

#[async_trait]
impl PermissionRepository for UnusedRepository {
    async fn list_permissions(
        &self,
        _query: &EntityQuery<PermissionRelation>,
    ) -> AppResult<Vec<PermissionRecord>> {
        Ok(Vec::new())
    }

    async fn find_permission(
        &self,
        _reference: &EntityRef,
        _relations: &[PermissionRelation],
    ) -> AppResult<Option<PermissionRecord>> {
        Ok(None)
    }

    async fn list_permission_keys(&self) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl GroupRepository for UnusedRepository {
    async fn list_groups(
        &self,
        _query: &EntityQuery<GroupRelation>,
    ) -> AppResult<Vec<GroupRecord>> {
        Ok(Vec::new())
    }

    async fn find_group(
        &self,
        _reference: &EntityRef,
        _relations: &[GroupRelation],
    ) -> AppResult<Option<GroupRecord>> {
        Ok(None)
    }

    async fn create_group(&self, _input: NewGroup) -> AppResult<GroupRecord> {
        Err(AppError::Internal("group persistence is not faked".to_owned()))
    }

    async fn update_group(
        &self,
        _group_id: i64,
        _changes: GroupChanges,
    ) -> AppResult<Option<GroupRecord>> {
        Ok(None)
    }

    async fn delete_group(&self, _group_id: i64) -> AppResult<bool> {
        Ok(false)
    }
}

struct FakeKeyIndex {
    keys: HashMap<(AccessKind, String), i64>,
}

#[async_trait]
impl AssignmentRepository for FakeKeyIndex {
    async fn resolve_keys(
        &self,
        kind: AccessKind,
        keys: &[String],
    ) -> AppResult<Vec<(i64, String)>> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.keys
                    .get(&(kind, key.clone()))
                    .map(|id| (*id, key.clone()))
            })
            .collect())
    }

    async fn attach(
        &self,
        _kind: AssignmentKind,
        _subject: &SubjectRef,
        _ids: &[i64],
    ) -> AppResult<u64> {
        Ok(0)
    }

    async fn detach(
        &self,
        _kind: AssignmentKind,
        _subject: &SubjectRef,
        _ids: &[i64],
    ) -> AppResult<u64> {
        Ok(0)
    }

    async fn subject_roles(&self, _subject: &SubjectRef) -> AppResult<Vec<Role>> {
        Ok(Vec::new())
    }

    async fn subject_permissions(&self, _subject: &SubjectRef) -> AppResult<Vec<Permission>> {
        Ok(Vec::new())
    }

    async fn subject_groups(&self, _subject: &SubjectRef) -> AppResult<Vec<Group>> {
        Ok(Vec::new())
    }

    async fn has_assignment(
        &self,
        _kind: AssignmentKind,
        _subject: &SubjectRef,
        _key: &str,
    ) -> AppResult<bool> {
        Ok(false)
    }

    async fn has_effective_role(&self, _subject: &SubjectRef, _key: &str) -> AppResult<bool> {
        Ok(false)
    }

    async fn has_effective_permission(
        &self,
        _subject: &SubjectRef,
        _key: &str,
    ) -> AppResult<bool> {
        Ok(false)
    }

    async fn effective_permissions(
        &self,
        _subject: &SubjectRef,
    ) -> AppResult<Vec<GuardedPermission>> {
        Ok(Vec::new())
    }
}

fn service() -> (
    AccessAdminService,
    Arc<FakeRoleRepository>,
    Arc<FakeGuardRepository>,
) {
    let roles = Arc::new(FakeRoleRepository::default());
    let guards = Arc::new(FakeGuardRepository::default());
    let unused = Arc::new(UnusedRepository);
    let service = AccessAdminService::new(AccessRepositories {
        guards: guards.clone(),
        permissions: unused.clone(),
        roles: roles.clone(),
        groups: unused,
        assignments: Arc::new(FakeKeyIndex {
            keys: HashMap::from([
                ((AccessKind::Permission, "edit-post".to_owned()), 11),
                ((AccessKind::Permission, "delete-post".to_owned()), 12),
            ]),
        }),
    });
    (service, roles, guards)
}

#[tokio::test]
async fn create_role_resolves_permission_keys() {
    let (service, roles, _) = service();

    let result = service
        .create_role(CreateRoleInput {
            key: " editor ".to_owned(),
            name: TranslatableText::from([("en", "Editor")]),
            permissions: vec![EntityRef::key("delete-post"), EntityRef::key("edit-post")],
        })
        .await;

    assert!(result.is_ok());
    let created = roles.created.lock().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].key, "editor");
    assert_eq!(created[0].permission_ids, vec![12, 11]);
}

#[tokio::test]
async fn create_role_rejects_unknown_and_mixed_references() {
    let (service, roles, _) = service();

    let unknown = service
        .create_role(CreateRoleInput {
            key: "editor".to_owned(),
            name: TranslatableText::new(),
            permissions: vec![EntityRef::key("publish-post")],
        })
        .await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let mixed = service
        .create_role(CreateRoleInput {
            key: "editor".to_owned(),
            name: TranslatableText::new(),
            permissions: vec![EntityRef::Id(11), EntityRef::key("edit-post")],
        })
        .await;
    assert!(matches!(mixed, Err(AppError::Validation(_))));

    assert!(roles.created.lock().await.is_empty());
}

#[tokio::test]
async fn create_role_requires_a_key() {
    let (service, _, _) = service();

    let result = service
        .create_role(CreateRoleInput {
            key: "   ".to_owned(),
            name: TranslatableText::from([("en", "Nameless")]),
            permissions: Vec::new(),
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn update_role_without_permissions_leaves_them_untouched() {
    let (service, roles, _) = service();

    let untouched = service
        .update_role(
            5,
            UpdateRoleInput {
                name: Some(TranslatableText::from([("en", "Writer")])),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    assert!(untouched.is_ok());

    let cleared = service
        .update_role(
            5,
            UpdateRoleInput {
                permissions: Some(Vec::new()),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    assert!(cleared.is_ok());

    let updated = roles.updated.lock().await;
    assert_eq!(updated[0].1.permission_ids, None);
    assert_eq!(updated[1].1.permission_ids, Some(Vec::new()));
}

#[tokio::test]
async fn list_without_materialize_returns_the_query() {
    let (service, roles, _) = service();

    let listing = service
        .list_roles(
            EntityFilter {
                key: Some("editor".to_owned()),
                name: None,
            },
            &[RoleRelation::Permissions],
            false,
        )
        .await;

    let query = listing.ok().and_then(Listing::into_query);
    assert!(query.is_some());
    assert_eq!(*roles.list_calls.lock().await, 0);

    let query = query
        .unwrap_or_default()
        .with_name("en", "Editor")
        .with_relation(RoleRelation::Groups);
    let fetched = service.fetch_roles(&query).await;
    assert_eq!(fetched.map(|records| records.len()).unwrap_or_default(), 1);
    assert_eq!(*roles.list_calls.lock().await, 1);
}

#[tokio::test]
async fn show_interprets_numeric_input_as_id() {
    let (service, roles, _) = service();

    assert!(service.show_role("42", &[]).await.is_ok());
    assert!(service.show_role("editor", &[]).await.is_ok());

    assert_eq!(
        *roles.looked_up.lock().await,
        vec![EntityRef::Id(42), EntityRef::key("editor")]
    );
}

#[tokio::test]
async fn guard_permissions_keys_are_validated() {
    let (service, _, guards) = service();

    let result = service
        .create_guard(CreateGuardInput {
            key: "posts".to_owned(),
            name: TranslatableText::from([("en", "Posts")]),
            permissions: vec![crate::GuardPermissionInput {
                id: None,
                key: " ".to_owned(),
                name: TranslatableText::new(),
            }],
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(guards.created.lock().await.is_empty());
}
