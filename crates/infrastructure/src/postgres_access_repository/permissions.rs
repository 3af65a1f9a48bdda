use super::*;

impl PostgresAccessRepository {
    async fn roles_of_permissions(
        &self,
        connection: &mut PgConnection,
        permission_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<Role>>> {
        let sql = format!(
            r#"
            SELECT links.permission_id AS owner_id, {columns}
            FROM {links} AS links
            INNER JOIN {roles} AS records ON records.id = links.{model_id}
            WHERE links.model_type = $1 AND links.permission_id = ANY($2)
            ORDER BY records.id
            "#,
            columns = record_columns("records"),
            links = self.tables().permission_assignments,
            roles = self.tables().roles,
            model_id = self.names.columns.model_id,
        );

        let rows = sqlx::query_as::<_, LinkedRecordRow>(sql.as_str())
            .bind(SubjectRef::internal_type(Role::SUBJECT_KIND))
            .bind(permission_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load permission roles: {error}"))
            })?;

        group_by_owner(
            rows.into_iter()
                .map(|row| row.record.into_role().map(|role| (row.owner_id, role))),
        )
    }

    async fn permission_records(
        &self,
        connection: &mut PgConnection,
        permissions: Vec<Permission>,
        relations: &[PermissionRelation],
    ) -> AppResult<Vec<PermissionRecord>> {
        let guards = if relations.contains(&PermissionRelation::Guard) {
            let mut guard_ids: Vec<i64> = permissions
                .iter()
                .map(|permission| permission.permission_guard_id)
                .collect();
            guard_ids.sort_unstable();
            guard_ids.dedup();
            Some(self.guards_by_ids(connection, &guard_ids).await?)
        } else {
            None
        };

        let mut roles = if relations.contains(&PermissionRelation::Roles) {
            let ids: Vec<i64> = permissions.iter().map(|permission| permission.id).collect();
            Some(self.roles_of_permissions(connection, &ids).await?)
        } else {
            None
        };

        Ok(permissions
            .into_iter()
            .map(|permission| PermissionRecord {
                guard: guards
                    .as_ref()
                    .and_then(|by_id| by_id.get(&permission.permission_guard_id).cloned()),
                roles: roles
                    .as_mut()
                    .map(|by_permission| by_permission.remove(&permission.id).unwrap_or_default()),
                permission,
            })
            .collect())
    }
}

#[async_trait]
impl PermissionRepository for PostgresAccessRepository {
    async fn list_permissions(
        &self,
        query: &EntityQuery<PermissionRelation>,
    ) -> AppResult<Vec<PermissionRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE {} ORDER BY records.id",
            permission_columns("records"),
            self.tables().permissions,
            filter_clause("records"),
        );

        let rows: Vec<PermissionRow> =
            fetch_filtered(&mut connection, sql.as_str(), &query.filter, "permissions").await?;
        let permissions = rows
            .into_iter()
            .map(PermissionRow::into_permission)
            .collect::<AppResult<Vec<_>>>()?;

        self.permission_records(&mut connection, permissions, &query.relations)
            .await
    }

    async fn find_permission(
        &self,
        reference: &EntityRef,
        relations: &[PermissionRelation],
    ) -> AppResult<Option<PermissionRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.{} = $1",
            permission_columns("records"),
            self.tables().permissions,
            reference_column(reference),
        );

        let Some(row) = fetch_by_reference::<PermissionRow>(
            &mut connection,
            sql.as_str(),
            reference,
            "permission",
        )
        .await?
        else {
            return Ok(None);
        };

        let records = self
            .permission_records(&mut connection, vec![row.into_permission()?], relations)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn list_permission_keys(&self) -> AppResult<Vec<String>> {
        let sql = format!("SELECT key FROM {} ORDER BY id", self.tables().permissions);

        sqlx::query_scalar::<_, String>(sql.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list permission keys: {error}")))
    }
}
