use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use rolegate_application::{
    AssignmentRepository, CreateGuardInput, EntityFilter, EntityQuery, GroupChanges, GroupRecord,
    GroupRelation, GroupRepository, GuardPermissionInput, GuardRecord, GuardRelation, NewGroup,
    NewRole, PermissionGuardRepository, PermissionRecord, PermissionRelation,
    PermissionRepository, RoleChanges, RoleRecord, RoleRelation, RoleRepository,
    UpdateGuardInput,
};
use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::{
    AccessKind, AssignmentKind, EntityRef, Group, GuardedPermission, Permission, PermissionGuard,
    Role, SyncPlan, TranslatableText,
};

mod catalog;


/// In-memory implementation of every access-control port.
///
/// Each write applies to a copy of the state that replaces the stored state only
/// when the whole operation succeeds.
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    state: RwLock<AccessState>,
}

impl InMemoryAccessRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn transact<T>(
        &self,
        apply: impl FnOnce(&mut AccessState) -> AppResult<T> + Send,
    ) -> AppResult<T> {
        let mut state = self.state.write().await;
        let mut draft = state.clone();
        let value = apply(&mut draft)?;
        *state = draft;
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    kind: AssignmentKind,
    target_id: i64,
    subject: SubjectRef,
}

#[derive(Debug, Clone, Default)]
struct AccessState {
    sequences: HashMap<AccessKind, i64>,
    guards: BTreeMap<i64, PermissionGuard>,
    permissions: BTreeMap<i64, Permission>,
    roles: BTreeMap<i64, Role>,
    groups: BTreeMap<i64, Group>,
    links: Vec<Link>,
}

impl AccessState {
    fn next_id(&mut self, kind: AccessKind) -> i64 {
        let sequence = self.sequences.entry(kind).or_insert(0);
        *sequence += 1;
        *sequence
    }

    fn keys(&self, kind: AccessKind) -> Vec<(i64, &str)> {
        match kind {
            AccessKind::PermissionGuard => self
                .guards
                .values()
                .map(|guard| (guard.id, guard.key.as_str()))
                .collect(),
            AccessKind::Permission => self
                .permissions
                .values()
                .map(|permission| (permission.id, permission.key.as_str()))
                .collect(),
            AccessKind::Role => self
                .roles
                .values()
                .map(|role| (role.id, role.key.as_str()))
                .collect(),
            AccessKind::Group => self
                .groups
                .values()
                .map(|group| (group.id, group.key.as_str()))
                .collect(),
        }
    }

    fn id_of_key(&self, kind: AccessKind, key: &str) -> Option<i64> {
        self.keys(kind)
            .into_iter()
            .find(|(_, stored_key)| *stored_key == key)
            .map(|(id, _)| id)
    }

    fn resolve(&self, kind: AccessKind, reference: &EntityRef) -> Option<i64> {
        match reference {
            EntityRef::Id(id) => self
                .keys(kind)
                .into_iter()
                .any(|(stored_id, _)| stored_id == *id)
                .then_some(*id),
            EntityRef::Key(key) => self.id_of_key(kind, key),
        }
    }

    /// Fails when `key` is used by another record of the same kind.
    fn ensure_key_free(&self, kind: AccessKind, key: &str, owner: Option<i64>) -> AppResult<()> {
        match self.id_of_key(kind, key) {
            Some(id) if Some(id) != owner => Err(AppError::Conflict(format!(
                "{} key '{key}' already exists",
                kind.as_str()
            ))),
            _ => Ok(()),
        }
    }

    fn attach(
        &mut self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let target = kind.target();
        let missing = ids
            .iter()
            .find(|id| self.resolve(target, &EntityRef::Id(**id)).is_none());
        if let Some(missing) = missing {
            return Err(AppError::NotFound(format!(
                "cannot link subject '{subject}' to {} #{missing} which does not exist",
                target.as_str()
            )));
        }

        let mut created = 0;
        for id in ids {
            let link = Link {
                kind,
                target_id: *id,
                subject: subject.clone(),
            };
            if !self.links.contains(&link) {
                self.links.push(link);
                created += 1;
            }
        }

        Ok(created)
    }

    fn detach(&mut self, kind: AssignmentKind, subject: &SubjectRef, ids: Option<&[i64]>) -> u64 {
        let before = self.links.len();
        self.links.retain(|link| {
            !(link.kind == kind
                && link.subject == *subject
                && ids.is_none_or(|ids| ids.contains(&link.target_id)))
        });
        u64::try_from(before - self.links.len()).unwrap_or(u64::MAX)
    }

    fn linked_ids(&self, kind: AssignmentKind, subject: &SubjectRef) -> Vec<i64> {
        self.links
            .iter()
            .filter(|link| link.kind == kind && link.subject == *subject)
            .map(|link| link.target_id)
            .collect()
    }

    fn sync(
        &mut self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        target: &[i64],
    ) -> AppResult<()> {
        let plan = SyncPlan::between(&self.linked_ids(kind, subject), target);
        if plan.is_noop() {
            return Ok(());
        }

        self.detach(kind, subject, Some(&plan.detach));
        self.attach(kind, subject, &plan.attach).map(|_| ())
    }

    /// Subjects linked to `target_id`, in link order.
    fn subjects_of(&self, kind: AssignmentKind, target_id: i64) -> Vec<&SubjectRef> {
        self.links
            .iter()
            .filter(|link| link.kind == kind && link.target_id == target_id)
            .map(|link| &link.subject)
            .collect()
    }

    fn drop_links_to(&mut self, kind: AssignmentKind, target_ids: &[i64]) {
        self.links
            .retain(|link| !(link.kind == kind && target_ids.contains(&link.target_id)));
    }

    fn held_role_ids(&self, subject: &SubjectRef) -> Vec<i64> {
        let mut role_ids = self.linked_ids(AssignmentKind::Role, subject);
        for group_id in self.linked_ids(AssignmentKind::Group, subject) {
            let active = self
                .groups
                .get(&group_id)
                .is_some_and(|group| group.is_active);
            if active {
                role_ids.extend(
                    self.linked_ids(AssignmentKind::Role, &Group::subject_for(group_id)),
                );
            }
        }

        role_ids.sort_unstable();
        role_ids.dedup();
        role_ids
    }

    fn effective_permission_ids(&self, subject: &SubjectRef) -> Vec<i64> {
        let mut permission_ids = self.linked_ids(AssignmentKind::Permission, subject);
        for role_id in self.held_role_ids(subject) {
            permission_ids.extend(
                self.linked_ids(AssignmentKind::Permission, &Role::subject_for(role_id)),
            );
        }

        permission_ids.sort_unstable();
        permission_ids.dedup();
        permission_ids
    }

    fn permissions_by_ids(&self, ids: &[i64]) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = ids
            .iter()
            .filter_map(|id| self.permissions.get(id).cloned())
            .collect();
        permissions.sort_by_key(|permission| permission.id);
        permissions
    }

    fn roles_by_ids(&self, ids: &[i64]) -> Vec<Role> {
        let mut roles: Vec<Role> = ids
            .iter()
            .filter_map(|id| self.roles.get(id).cloned())
            .collect();
        roles.sort_by_key(|role| role.id);
        roles
    }

    fn groups_by_ids(&self, ids: &[i64]) -> Vec<Group> {
        let mut groups: Vec<Group> = ids
            .iter()
            .filter_map(|id| self.groups.get(id).cloned())
            .collect();
        groups.sort_by_key(|group| group.id);
        groups
    }
}

fn matches_filter(filter: &EntityFilter, key: &str, name: &TranslatableText) -> bool {
    let key_matches = filter.key.as_deref().is_none_or(|expected| expected == key);
    let name_matches = filter
        .name
        .as_ref()
        .is_none_or(|expected| name.get(expected.locale.as_str()) == Some(expected.value.as_str()));

    key_matches && name_matches
}

#[async_trait]
impl AssignmentRepository for InMemoryAccessRepository {
    async fn resolve_keys(
        &self,
        kind: AccessKind,
        keys: &[String],
    ) -> AppResult<Vec<(i64, String)>> {
        let state = self.state.read().await;

        Ok(state
            .keys(kind)
            .into_iter()
            .filter(|(_, key)| keys.iter().any(|requested| requested == key))
            .map(|(id, key)| (id, key.to_owned()))
            .collect())
    }

    async fn attach(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let subject = subject.clone();
        let ids = ids.to_vec();
        self.transact(move |state| state.attach(kind, &subject, &ids))
            .await
    }

    async fn detach(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let mut state = self.state.write().await;
        Ok(state.detach(kind, subject, Some(ids)))
    }

    async fn subject_roles(&self, subject: &SubjectRef) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(state.roles_by_ids(&state.linked_ids(AssignmentKind::Role, subject)))
    }

    async fn subject_permissions(&self, subject: &SubjectRef) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state.permissions_by_ids(&state.linked_ids(AssignmentKind::Permission, subject)))
    }

    async fn subject_groups(&self, subject: &SubjectRef) -> AppResult<Vec<Group>> {
        let state = self.state.read().await;
        Ok(state.groups_by_ids(&state.linked_ids(AssignmentKind::Group, subject)))
    }

    async fn has_assignment(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool> {
        let state = self.state.read().await;
        let Some(id) = state.id_of_key(kind.target(), key) else {
            return Ok(false);
        };

        Ok(state.linked_ids(kind, subject).contains(&id))
    }

    async fn has_effective_role(&self, subject: &SubjectRef, key: &str) -> AppResult<bool> {
        let state = self.state.read().await;
        let Some(role_id) = state.id_of_key(AccessKind::Role, key) else {
            return Ok(false);
        };

        Ok(state.held_role_ids(subject).contains(&role_id))
    }

    async fn has_effective_permission(
        &self,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool> {
        let state = self.state.read().await;
        let Some(permission_id) = state.id_of_key(AccessKind::Permission, key) else {
            return Ok(false);
        };

        Ok(state
            .effective_permission_ids(subject)
            .contains(&permission_id))
    }

    async fn effective_permissions(
        &self,
        subject: &SubjectRef,
    ) -> AppResult<Vec<GuardedPermission>> {
        let state = self.state.read().await;

        Ok(state
            .permissions_by_ids(&state.effective_permission_ids(subject))
            .into_iter()
            .map(|permission| GuardedPermission {
                guard: state.guards.get(&permission.permission_guard_id).cloned(),
                permission,
            })
            .collect())
    }
}
