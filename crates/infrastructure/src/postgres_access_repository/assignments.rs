use super::*;

impl PostgresAccessRepository {
    /// `held_roles` for subject `$1`/`$2`, through groups linked under type `$3`.
    fn held_roles_cte(&self) -> String {
        format!(
            r#"
            WITH held_roles AS (
                SELECT links.role_id
                FROM {role_links} AS links
                WHERE links.model_type = $1 AND links.{model_id} = $2
                UNION
                SELECT links.role_id
                FROM {role_links} AS links
                INNER JOIN {groupables} AS members
                    ON links.model_type = $3 AND links.{model_id} = members.group_id
                INNER JOIN {groups} AS held_groups ON held_groups.id = members.group_id
                WHERE held_groups.is_active
                  AND members.groupable_type = $1
                  AND members.{groupable_id} = $2
            )
            "#,
            role_links = self.tables().role_assignments,
            groupables = self.tables().groupables,
            groups = self.tables().groups,
            model_id = self.names.columns.model_id,
            groupable_id = self.names.columns.groupable_id,
        )
    }

    /// `effective` permission ids; role links are stored under type `$4`.
    fn effective_permissions_cte(&self) -> String {
        format!(
            r#"
            {held_roles},
            effective AS (
                SELECT links.permission_id
                FROM {permission_links} AS links
                WHERE links.model_type = $1 AND links.{model_id} = $2
                UNION
                SELECT links.permission_id
                FROM {permission_links} AS links
                INNER JOIN held_roles
                    ON links.model_type = $4 AND links.{model_id} = held_roles.role_id
            )
            "#,
            held_roles = self.held_roles_cte(),
            permission_links = self.tables().permission_assignments,
            model_id = self.names.columns.model_id,
        )
    }

    fn subject_records_sql(&self, kind: AssignmentKind, columns: &str) -> String {
        let link = self.link_table(kind);
        format!(
            r#"
            SELECT {columns}
            FROM {table} AS links
            INNER JOIN {records} AS records ON records.id = links.{target}
            WHERE links.{subject_type} = $1 AND links.{subject_id} = $2
            ORDER BY records.id
            "#,
            table = link.table,
            records = self.record_table(kind.target()),
            target = link.target,
            subject_type = link.subject_type,
            subject_id = link.subject_id,
        )
    }
}

#[async_trait]
impl AssignmentRepository for PostgresAccessRepository {
    async fn resolve_keys(
        &self,
        kind: AccessKind,
        keys: &[String],
    ) -> AppResult<Vec<(i64, String)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, key FROM {} WHERE key = ANY($1) ORDER BY id",
            self.record_table(kind)
        );

        sqlx::query_as::<_, (i64, String)>(sql.as_str())
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to resolve {} keys: {error}", kind.as_str()))
            })
    }

    async fn attach(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        let mut connection = self.connection().await?;
        let created = self.insert_links(&mut connection, kind, subject, ids).await?;

        tracing::debug!(
            subject = %subject,
            kind = kind.target().as_str(),
            requested = ids.len(),
            created,
            "subject links attached"
        );

        Ok(created)
    }

    async fn detach(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection().await?;
        let removed = self
            .delete_links(&mut connection, kind, subject, Some(ids))
            .await?;

        tracing::debug!(
            subject = %subject,
            kind = kind.target().as_str(),
            removed,
            "subject links detached"
        );

        Ok(removed)
    }

    async fn subject_roles(&self, subject: &SubjectRef) -> AppResult<Vec<Role>> {
        let sql = self.subject_records_sql(AssignmentKind::Role, &record_columns("records"));

        sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list roles of '{subject}': {error}"))
            })?
            .into_iter()
            .map(RecordRow::into_role)
            .collect()
    }

    async fn subject_permissions(&self, subject: &SubjectRef) -> AppResult<Vec<Permission>> {
        let sql =
            self.subject_records_sql(AssignmentKind::Permission, &permission_columns("records"));

        sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list permissions of '{subject}': {error}"))
            })?
            .into_iter()
            .map(PermissionRow::into_permission)
            .collect()
    }

    async fn subject_groups(&self, subject: &SubjectRef) -> AppResult<Vec<Group>> {
        let sql = self.subject_records_sql(AssignmentKind::Group, &group_columns("records"));

        sqlx::query_as::<_, GroupRow>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list groups of '{subject}': {error}"))
            })?
            .into_iter()
            .map(GroupRow::into_group)
            .collect()
    }

    async fn has_assignment(
        &self,
        kind: AssignmentKind,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool> {
        let link = self.link_table(kind);
        let sql = format!(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM {table} AS links
                INNER JOIN {records} AS records ON records.id = links.{target}
                WHERE links.{subject_type} = $1
                  AND links.{subject_id} = $2
                  AND records.key = $3
            )
            "#,
            table = link.table,
            records = self.record_table(kind.target()),
            target = link.target,
            subject_type = link.subject_type,
            subject_id = link.subject_id,
        );

        sqlx::query_scalar::<_, bool>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to check {} '{key}' for '{subject}': {error}",
                    kind.target().as_str()
                ))
            })
    }

    async fn has_effective_role(&self, subject: &SubjectRef, key: &str) -> AppResult<bool> {
        let sql = format!(
            r#"
            {held_roles}
            SELECT EXISTS (
                SELECT 1
                FROM held_roles
                INNER JOIN {roles} AS records ON records.id = held_roles.role_id
                WHERE records.key = $4
            )
            "#,
            held_roles = self.held_roles_cte(),
            roles = self.tables().roles,
        );

        sqlx::query_scalar::<_, bool>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .bind(SubjectRef::internal_type(Group::SUBJECT_KIND))
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to check role '{key}' for '{subject}': {error}"))
            })
    }

    async fn has_effective_permission(
        &self,
        subject: &SubjectRef,
        key: &str,
    ) -> AppResult<bool> {
        let sql = format!(
            r#"
            {effective}
            SELECT EXISTS (
                SELECT 1
                FROM effective
                INNER JOIN {permissions} AS records ON records.id = effective.permission_id
                WHERE records.key = $5
            )
            "#,
            effective = self.effective_permissions_cte(),
            permissions = self.tables().permissions,
        );

        let allowed = sqlx::query_scalar::<_, bool>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .bind(SubjectRef::internal_type(Group::SUBJECT_KIND))
            .bind(SubjectRef::internal_type(Role::SUBJECT_KIND))
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to check permission '{key}' for '{subject}': {error}"
                ))
            })?;

        tracing::debug!(subject = %subject, permission = key, allowed, "permission checked");
        Ok(allowed)
    }

    async fn effective_permissions(
        &self,
        subject: &SubjectRef,
    ) -> AppResult<Vec<GuardedPermission>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            r#"
            {effective}
            SELECT {columns}
            FROM effective
            INNER JOIN {permissions} AS records ON records.id = effective.permission_id
            ORDER BY records.id
            "#,
            effective = self.effective_permissions_cte(),
            columns = permission_columns("records"),
            permissions = self.tables().permissions,
        );

        let permissions = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .bind(SubjectRef::internal_type(Group::SUBJECT_KIND))
            .bind(SubjectRef::internal_type(Role::SUBJECT_KIND))
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load effective permissions of '{subject}': {error}"
                ))
            })?
            .into_iter()
            .map(PermissionRow::into_permission)
            .collect::<AppResult<Vec<_>>>()?;

        let mut guard_ids: Vec<i64> = permissions
            .iter()
            .map(|permission| permission.permission_guard_id)
            .collect();
        guard_ids.sort_unstable();
        guard_ids.dedup();
        let guards = self.guards_by_ids(&mut connection, &guard_ids).await?;

        Ok(permissions
            .into_iter()
            .map(|permission| GuardedPermission {
                guard: guards.get(&permission.permission_guard_id).cloned(),
                permission,
            })
            .collect())
    }
}
