use super::*;

impl AccessState {
    /// Ids of internal records of `kind` linked to `target_id`.
    fn internal_holders(&self, kind: AssignmentKind, target_id: i64, holder: &str) -> Vec<i64> {
        let holder_type = SubjectRef::internal_type(holder);
        self.subjects_of(kind, target_id)
            .into_iter()
            .filter(|subject| subject.subject_type() == holder_type)
            .map(SubjectRef::subject_id)
            .collect()
    }

    fn guard_record(&self, guard: &PermissionGuard, relations: &[GuardRelation]) -> GuardRecord {
        GuardRecord {
            guard: guard.clone(),
            permissions: relations.contains(&GuardRelation::Permissions).then(|| {
                self.permissions
                    .values()
                    .filter(|permission| permission.permission_guard_id == guard.id)
                    .cloned()
                    .collect()
            }),
        }
    }

    fn permission_record(
        &self,
        permission: &Permission,
        relations: &[PermissionRelation],
    ) -> PermissionRecord {
        PermissionRecord {
            permission: permission.clone(),
            guard: relations
                .contains(&PermissionRelation::Guard)
                .then(|| self.guards.get(&permission.permission_guard_id).cloned())
                .flatten(),
            roles: relations.contains(&PermissionRelation::Roles).then(|| {
                self.roles_by_ids(&self.internal_holders(
                    AssignmentKind::Permission,
                    permission.id,
                    Role::SUBJECT_KIND,
                ))
            }),
        }
    }

    fn role_record(&self, role: &Role, relations: &[RoleRelation]) -> RoleRecord {
        RoleRecord {
            role: role.clone(),
            permissions: relations.contains(&RoleRelation::Permissions).then(|| {
                self.permissions_by_ids(
                    &self.linked_ids(AssignmentKind::Permission, &Role::subject_for(role.id)),
                )
            }),
            groups: relations.contains(&RoleRelation::Groups).then(|| {
                self.groups_by_ids(&self.internal_holders(
                    AssignmentKind::Role,
                    role.id,
                    Group::SUBJECT_KIND,
                ))
            }),
        }
    }

    fn group_record(&self, group: &Group, relations: &[GroupRelation]) -> GroupRecord {
        GroupRecord {
            group: group.clone(),
            roles: relations.contains(&GroupRelation::Roles).then(|| {
                self.roles_by_ids(
                    &self.linked_ids(AssignmentKind::Role, &Group::subject_for(group.id)),
                )
            }),
            members: relations.contains(&GroupRelation::Members).then(|| {
                self.subjects_of(AssignmentKind::Group, group.id)
                    .into_iter()
                    .cloned()
                    .collect()
            }),
        }
    }

    fn insert_permission(
        &mut self,
        guard_id: i64,
        input: &GuardPermissionInput,
    ) -> AppResult<Permission> {
        self.ensure_key_free(AccessKind::Permission, input.key.as_str(), None)?;

        let now = Utc::now();
        let permission = Permission {
            id: self.next_id(AccessKind::Permission),
            key: input.key.clone(),
            name: input.name.clone(),
            permission_guard_id: guard_id,
            created_at: now,
            updated_at: now,
        };
        self.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    /// Matches by id within the guard when given, otherwise by key.
    fn upsert_permission(&mut self, guard_id: i64, input: &GuardPermissionInput) -> AppResult<()> {
        let (permission_id, key_changes) = match input.id {
            Some(permission_id) => {
                let owned = self
                    .permissions
                    .get(&permission_id)
                    .is_some_and(|permission| permission.permission_guard_id == guard_id);
                if !owned {
                    return Err(AppError::NotFound(format!(
                        "permission #{permission_id} does not belong to guard #{guard_id}"
                    )));
                }
                self.ensure_key_free(
                    AccessKind::Permission,
                    input.key.as_str(),
                    Some(permission_id),
                )?;
                (permission_id, true)
            }
            None => match self.id_of_key(AccessKind::Permission, input.key.as_str()) {
                None => return self.insert_permission(guard_id, input).map(|_| ()),
                Some(permission_id) => (permission_id, false),
            },
        };

        let Some(permission) = self.permissions.get_mut(&permission_id) else {
            return Err(AppError::NotFound(format!(
                "permission #{permission_id} does not exist"
            )));
        };
        if permission.permission_guard_id != guard_id {
            return Err(AppError::Conflict(format!(
                "permission '{}' belongs to guard #{}",
                input.key, permission.permission_guard_id
            )));
        }

        if key_changes {
            permission.key = input.key.clone();
        }
        permission.name = input.name.clone();
        permission.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PermissionGuardRepository for InMemoryAccessRepository {
    async fn list_guards(
        &self,
        query: &EntityQuery<GuardRelation>,
    ) -> AppResult<Vec<GuardRecord>> {
        let state = self.state.read().await;

        Ok(state
            .guards
            .values()
            .filter(|guard| matches_filter(&query.filter, guard.key.as_str(), &guard.name))
            .map(|guard| state.guard_record(guard, &query.relations))
            .collect())
    }

    async fn find_guard(
        &self,
        reference: &EntityRef,
        relations: &[GuardRelation],
    ) -> AppResult<Option<GuardRecord>> {
        let state = self.state.read().await;

        Ok(state
            .resolve(AccessKind::PermissionGuard, reference)
            .and_then(|id| state.guards.get(&id))
            .map(|guard| state.guard_record(guard, relations)))
    }

    async fn create_guard(&self, input: CreateGuardInput) -> AppResult<GuardRecord> {
        self.transact(move |state| {
            state.ensure_key_free(AccessKind::PermissionGuard, input.key.as_str(), None)?;

            let now = Utc::now();
            let guard = PermissionGuard {
                id: state.next_id(AccessKind::PermissionGuard),
                key: input.key,
                name: input.name,
                created_at: now,
                updated_at: now,
            };
            state.guards.insert(guard.id, guard.clone());

            let permissions = input
                .permissions
                .iter()
                .map(|permission| state.insert_permission(guard.id, permission))
                .collect::<AppResult<Vec<_>>>()?;

            Ok(GuardRecord {
                guard,
                permissions: Some(permissions),
            })
        })
        .await
    }

    async fn update_guard(
        &self,
        guard_id: i64,
        input: UpdateGuardInput,
    ) -> AppResult<Option<GuardRecord>> {
        self.transact(move |state| {
            if !state.guards.contains_key(&guard_id) {
                return Ok(None);
            }

            if let Some(key) = &input.key {
                state.ensure_key_free(AccessKind::PermissionGuard, key.as_str(), Some(guard_id))?;
            }
            for permission in &input.permissions {
                state.upsert_permission(guard_id, permission)?;
            }

            let Some(guard) = state.guards.get_mut(&guard_id) else {
                return Ok(None);
            };
            if let Some(key) = input.key {
                guard.key = key;
            }
            if let Some(name) = input.name {
                guard.name = name;
            }
            guard.updated_at = Utc::now();

            let guard = guard.clone();
            Ok(Some(state.guard_record(&guard, &[GuardRelation::Permissions])))
        })
        .await
    }

    async fn delete_guard(&self, guard_id: i64) -> AppResult<bool> {
        self.transact(move |state| {
            if state.guards.remove(&guard_id).is_none() {
                return Ok(false);
            }

            let permission_ids: Vec<i64> = state
                .permissions
                .values()
                .filter(|permission| permission.permission_guard_id == guard_id)
                .map(|permission| permission.id)
                .collect();
            state
                .permissions
                .retain(|_, permission| permission.permission_guard_id != guard_id);
            state.drop_links_to(AssignmentKind::Permission, &permission_ids);

            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl PermissionRepository for InMemoryAccessRepository {
    async fn list_permissions(
        &self,
        query: &EntityQuery<PermissionRelation>,
    ) -> AppResult<Vec<PermissionRecord>> {
        let state = self.state.read().await;

        Ok(state
            .permissions
            .values()
            .filter(|permission| {
                matches_filter(&query.filter, permission.key.as_str(), &permission.name)
            })
            .map(|permission| state.permission_record(permission, &query.relations))
            .collect())
    }

    async fn find_permission(
        &self,
        reference: &EntityRef,
        relations: &[PermissionRelation],
    ) -> AppResult<Option<PermissionRecord>> {
        let state = self.state.read().await;

        Ok(state
            .resolve(AccessKind::Permission, reference)
            .and_then(|id| state.permissions.get(&id))
            .map(|permission| state.permission_record(permission, relations)))
    }

    async fn list_permission_keys(&self) -> AppResult<Vec<String>> {
        let state = self.state.read().await;

        Ok(state
            .permissions
            .values()
            .map(|permission| permission.key.clone())
            .collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryAccessRepository {
    async fn list_roles(&self, query: &EntityQuery<RoleRelation>) -> AppResult<Vec<RoleRecord>> {
        let state = self.state.read().await;

        Ok(state
            .roles
            .values()
            .filter(|role| matches_filter(&query.filter, role.key.as_str(), &role.name))
            .map(|role| state.role_record(role, &query.relations))
            .collect())
    }

    async fn find_role(
        &self,
        reference: &EntityRef,
        relations: &[RoleRelation],
    ) -> AppResult<Option<RoleRecord>> {
        let state = self.state.read().await;

        Ok(state
            .resolve(AccessKind::Role, reference)
            .and_then(|id| state.roles.get(&id))
            .map(|role| state.role_record(role, relations)))
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        self.transact(move |state| {
            state.ensure_key_free(AccessKind::Role, input.key.as_str(), None)?;

            let now = Utc::now();
            let role = Role {
                id: state.next_id(AccessKind::Role),
                key: input.key,
                name: input.name,
                created_at: now,
                updated_at: now,
            };
            state.roles.insert(role.id, role.clone());
            state.attach(
                AssignmentKind::Permission,
                &Role::subject_for(role.id),
                &input.permission_ids,
            )?;

            Ok(state.role_record(&role, &[RoleRelation::Permissions]))
        })
        .await
    }

    async fn update_role(
        &self,
        role_id: i64,
        changes: RoleChanges,
    ) -> AppResult<Option<RoleRecord>> {
        self.transact(move |state| {
            if let Some(key) = &changes.key {
                state.ensure_key_free(AccessKind::Role, key.as_str(), Some(role_id))?;
            }

            let Some(role) = state.roles.get_mut(&role_id) else {
                return Ok(None);
            };
            if let Some(key) = changes.key {
                role.key = key;
            }
            if let Some(name) = changes.name {
                role.name = name;
            }
            role.updated_at = Utc::now();
            let role = role.clone();

            if let Some(permission_ids) = &changes.permission_ids {
                state.sync(
                    AssignmentKind::Permission,
                    &Role::subject_for(role_id),
                    permission_ids,
                )?;
            }

            Ok(Some(state.role_record(&role, &[RoleRelation::Permissions])))
        })
        .await
    }

    async fn delete_role(&self, role_id: i64) -> AppResult<bool> {
        self.transact(move |state| {
            if state.roles.remove(&role_id).is_none() {
                return Ok(false);
            }

            state.detach(AssignmentKind::Permission, &Role::subject_for(role_id), None);
            state.drop_links_to(AssignmentKind::Role, &[role_id]);
            Ok(true)
        })
        .await
    }
}

#[async_trait]
impl GroupRepository for InMemoryAccessRepository {
    async fn list_groups(
        &self,
        query: &EntityQuery<GroupRelation>,
    ) -> AppResult<Vec<GroupRecord>> {
        let state = self.state.read().await;

        Ok(state
            .groups
            .values()
            .filter(|group| matches_filter(&query.filter, group.key.as_str(), &group.name))
            .map(|group| state.group_record(group, &query.relations))
            .collect())
    }

    async fn find_group(
        &self,
        reference: &EntityRef,
        relations: &[GroupRelation],
    ) -> AppResult<Option<GroupRecord>> {
        let state = self.state.read().await;

        Ok(state
            .resolve(AccessKind::Group, reference)
            .and_then(|id| state.groups.get(&id))
            .map(|group| state.group_record(group, relations)))
    }

    async fn create_group(&self, input: NewGroup) -> AppResult<GroupRecord> {
        self.transact(move |state| {
            state.ensure_key_free(AccessKind::Group, input.key.as_str(), None)?;

            let now = Utc::now();
            let group = Group {
                id: state.next_id(AccessKind::Group),
                key: input.key,
                name: input.name,
                description: input.description,
                is_active: input.is_active,
                created_at: now,
                updated_at: now,
            };
            state.groups.insert(group.id, group.clone());
            state.attach(
                AssignmentKind::Role,
                &Group::subject_for(group.id),
                &input.role_ids,
            )?;

            Ok(state.group_record(&group, &[GroupRelation::Roles]))
        })
        .await
    }

    async fn update_group(
        &self,
        group_id: i64,
        changes: GroupChanges,
    ) -> AppResult<Option<GroupRecord>> {
        self.transact(move |state| {
            if let Some(key) = &changes.key {
                state.ensure_key_free(AccessKind::Group, key.as_str(), Some(group_id))?;
            }

            let Some(group) = state.groups.get_mut(&group_id) else {
                return Ok(None);
            };
            if let Some(key) = changes.key {
                group.key = key;
            }
            if let Some(name) = changes.name {
                group.name = name;
            }
            if let Some(description) = changes.description {
                group.description = Some(description);
            }
            if let Some(is_active) = changes.is_active {
                group.is_active = is_active;
            }
            group.updated_at = Utc::now();
            let group = group.clone();

            if let Some(role_ids) = &changes.role_ids {
                state.sync(AssignmentKind::Role, &Group::subject_for(group_id), role_ids)?;
            }

            Ok(Some(state.group_record(&group, &[GroupRelation::Roles])))
        })
        .await
    }

    async fn delete_group(&self, group_id: i64) -> AppResult<bool> {
        self.transact(move |state| {
            if state.groups.remove(&group_id).is_none() {
                return Ok(false);
            }

            state.detach(AssignmentKind::Role, &Group::subject_for(group_id), None);
            state.drop_links_to(AssignmentKind::Group, &[group_id]);
            Ok(true)
        })
        .await
    }
}
