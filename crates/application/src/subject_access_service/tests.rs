use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::{
    AccessKind, AssignmentKind, EntityRef, Group, GuardedPermission, Permission, PermissionGuard,
    Role, TranslatableText,
};

use crate::AssignmentRepository;

use super::{AccessSubject, SubjectAccessService};

#[derive(Default)]
struct FakeAssignmentRepository {
    keys: HashMap<(AccessKind, String), i64>,
    links: Mutex<Vec<(AssignmentKind, SubjectRef, i64)>>,
    effective: Vec<GuardedPermission>,
}

impl FakeAssignmentRepository {
    fn with_key(mut self, kind: AccessKind, key: &str, id: i64) -> Self {
        self.keys.insert((kind, key.to_owned()), id);
        self
    }

    async fn link_count(&self, kind: AssignmentKind) -> usize {
        self.links
            .lock()
            .await
            .iter()
            .filter(|(stored_kind, _, _)| *stored_kind == kind)
            .count()
    }
}

#[async_trait]
impl AssignmentRepository for FakeAssignmentRepository {
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
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let mut links = self.links.lock().await;
        let mut created = 0;
        for id in ids {
            let link = (kind, subject.clone(), *id);
            if !links.contains(&link) {
                links.push(link);
                created += 1;
            }
        }
        Ok(created)
    }

    async fn detach(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let mut links = self.links.lock().await;
        let before = links.len();
        links.retain(|(stored_kind, stored_subject, stored_id)| {
            !(stored_kind == &kind && stored_subject == subject && ids.contains(stored_id))
        });
        Ok(u64::try_from(before - links.len()).unwrap_or_default())
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
        kind: AssignmentKind,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool> {
        let Some(id) = self.keys.get(&(kind.target(), key.to_owned())) else {
            return Ok(false);
        };
        Ok(self
            .links
            .lock()
            .await
            .contains(&(kind, subject.clone(), *id)))
    }

    async fn has_effective_role(&self, subject: &SubjectRef, key: &str) -> AppResult<bool> {
        self.has_assignment(AssignmentKind::Role, subject, key).await
    }

    async fn has_effective_permission(&self, subject: &SubjectRef, key: &str) -> AppResult<bool> {
        self.has_assignment(AssignmentKind::Permission, subject, key)
            .await
    }

    async fn effective_permissions(
        &self,
        _subject: &SubjectRef,
    ) -> AppResult<Vec<GuardedPermission>> {
        Ok(self.effective.clone())
    }
}

fn user(id: i64) -> SubjectRef {
    SubjectRef::new("user", id).unwrap_or_else(|_| unreachable!())
}

fn guarded(key: &str, guard_key: &str) -> GuardedPermission {
    GuardedPermission {
        permission: Permission {
            id: 1,
            key: key.to_owned(),
            name: TranslatableText::from([("en", "Edit"), ("ar", "تعديل")]),
            permission_guard_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        guard: Some(PermissionGuard {
            id: 1,
            key: guard_key.to_owned(),
            name: TranslatableText::from([("en", "Posts")]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }),
    }
}

#[tokio::test]
async fn assigning_the_same_role_twice_keeps_one_link() {
    let repository = Arc::new(
        FakeAssignmentRepository::default().with_key(AccessKind::Role, "editor", 4),
    );
    let service = SubjectAccessService::new(repository.clone());
    let subject = user(1);

    let first = service
        .assign_role(&subject, &[EntityRef::key("editor")])
        .await;
    let second = service.assign_role(&subject, &[EntityRef::Id(4)]).await;

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(repository.link_count(AssignmentKind::Role).await, 1);
    assert!(service.has_role(&subject, "editor").await.unwrap_or(false));
}

#[tokio::test]
async fn assigning_unknown_keys_is_not_found() {
    let repository = Arc::new(FakeAssignmentRepository::default());
    let service = SubjectAccessService::new(repository.clone());

    let result = service
        .assign_role(&user(1), &[EntityRef::key("viewer")])
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(repository.link_count(AssignmentKind::Role).await, 0);
}

#[tokio::test]
async fn mixed_reference_lists_are_rejected() {
    let repository = Arc::new(
        FakeAssignmentRepository::default().with_key(AccessKind::Group, "team", 2),
    );
    let service = SubjectAccessService::new(repository);

    let result = service
        .assign_to_groups(&user(1), &[EntityRef::Id(2), EntityRef::key("team")])
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn removing_unassigned_or_unknown_roles_is_a_noop() {
    let repository = Arc::new(
        FakeAssignmentRepository::default().with_key(AccessKind::Role, "editor", 4),
    );
    let service = SubjectAccessService::new(repository.clone());

    assert!(
        service
            .remove_role(&user(1), &[EntityRef::key("editor")])
            .await
            .is_ok()
    );
    assert!(
        service
            .remove_role(&user(1), &[EntityRef::key("viewer")])
            .await
            .is_ok()
    );
    assert_eq!(repository.link_count(AssignmentKind::Role).await, 0);
}

#[tokio::test]
async fn group_membership_round_trip() {
    let repository = Arc::new(
        FakeAssignmentRepository::default().with_key(AccessKind::Group, "team", 2),
    );
    let service = SubjectAccessService::new(repository);
    let subject = user(9);

    assert!(
        service
            .assign_to_groups(&subject, &[EntityRef::key("team")])
            .await
            .is_ok()
    );
    assert!(service.in_group(&subject, "team").await.unwrap_or(false));

    assert!(
        service
            .remove_from_groups(&subject, &[EntityRef::key("team")])
            .await
            .is_ok()
    );
    assert!(!service.in_group(&subject, "team").await.unwrap_or(true));
}

#[tokio::test]
async fn grouped_permissions_require_loaded_permissions() {
    let repository = Arc::new(FakeAssignmentRepository {
        effective: vec![guarded("edit-post", "posts")],
        ..FakeAssignmentRepository::default()
    });
    let service = SubjectAccessService::new(repository);
    let subject = user(3);

    let unloaded = AccessSubject::new(subject.clone());
    assert!(!unloaded.permissions_loaded());
    assert!(unloaded.grouped_permissions_by_guard().is_empty());

    let loaded = service.load_permissions(&subject).await;
    assert!(loaded.is_ok());
    let grouped = loaded
        .map(|loaded| loaded.grouped_permissions_by_guard())
        .unwrap_or_default();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].key.as_deref(), Some("posts"));
    assert_eq!(grouped[0].permissions[0].name.as_deref(), Some("تعديل"));
}
