use super::*;

impl PostgresAccessRepository {
    async fn permissions_of_roles(
        &self,
        connection: &mut PgConnection,
        role_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<Permission>>> {
        let sql = format!(
            r#"
            SELECT links.{model_id} AS owner_id, {columns}
            FROM {links} AS links
            INNER JOIN {permissions} AS records ON records.id = links.permission_id
            WHERE links.model_type = $1 AND links.{model_id} = ANY($2)
            ORDER BY records.id
            "#,
            columns = permission_columns("records"),
            links = self.tables().permission_assignments,
            permissions = self.tables().permissions,
            model_id = self.names.columns.model_id,
        );

        let rows = sqlx::query_as::<_, LinkedPermissionRow>(sql.as_str())
            .bind(SubjectRef::internal_type(Role::SUBJECT_KIND))
            .bind(role_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load role permissions: {error}"))
            })?;

        group_by_owner(rows.into_iter().map(|row| {
            row.permission
                .into_permission()
                .map(|permission| (row.owner_id, permission))
        }))
    }

    async fn groups_of_roles(
        &self,
        connection: &mut PgConnection,
        role_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<Group>>> {
        let sql = format!(
            r#"
            SELECT links.role_id AS owner_id, {columns}
            FROM {links} AS links
            INNER JOIN {groups} AS records ON records.id = links.{model_id}
            WHERE links.model_type = $1 AND links.role_id = ANY($2)
            ORDER BY records.id
            "#,
            columns = group_columns("records"),
            links = self.tables().role_assignments,
            groups = self.tables().groups,
            model_id = self.names.columns.model_id,
        );

        let rows = sqlx::query_as::<_, LinkedGroupRow>(sql.as_str())
            .bind(SubjectRef::internal_type(Group::SUBJECT_KIND))
            .bind(role_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load role groups: {error}")))?;

        group_by_owner(
            rows.into_iter()
                .map(|row| row.group.into_group().map(|group| (row.owner_id, group))),
        )
    }

    async fn role_records(
        &self,
        connection: &mut PgConnection,
        roles: Vec<Role>,
        relations: &[RoleRelation],
    ) -> AppResult<Vec<RoleRecord>> {
        let ids: Vec<i64> = roles.iter().map(|role| role.id).collect();

        let mut permissions = if relations.contains(&RoleRelation::Permissions) {
            Some(self.permissions_of_roles(connection, &ids).await?)
        } else {
            None
        };

        let mut groups = if relations.contains(&RoleRelation::Groups) {
            Some(self.groups_of_roles(connection, &ids).await?)
        } else {
            None
        };

        Ok(roles
            .into_iter()
            .map(|role| RoleRecord {
                permissions: permissions
                    .as_mut()
                    .map(|by_role| by_role.remove(&role.id).unwrap_or_default()),
                groups: groups
                    .as_mut()
                    .map(|by_role| by_role.remove(&role.id).unwrap_or_default()),
                role,
            })
            .collect())
    }
}

#[async_trait]
impl RoleRepository for PostgresAccessRepository {
    async fn list_roles(&self, query: &EntityQuery<RoleRelation>) -> AppResult<Vec<RoleRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE {} ORDER BY records.id",
            record_columns("records"),
            self.tables().roles,
            filter_clause("records"),
        );

        let rows: Vec<RecordRow> =
            fetch_filtered(&mut connection, sql.as_str(), &query.filter, "roles").await?;
        let roles = rows
            .into_iter()
            .map(RecordRow::into_role)
            .collect::<AppResult<Vec<_>>>()?;

        self.role_records(&mut connection, roles, &query.relations)
            .await
    }

    async fn find_role(
        &self,
        reference: &EntityRef,
        relations: &[RoleRelation],
    ) -> AppResult<Option<RoleRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.{} = $1",
            record_columns("records"),
            self.tables().roles,
            reference_column(reference),
        );

        let Some(row) =
            fetch_by_reference::<RecordRow>(&mut connection, sql.as_str(), reference, "role")
                .await?
        else {
            return Ok(None);
        };

        let records = self
            .role_records(&mut connection, vec![row.into_role()?], relations)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        let mut transaction = self.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO {} AS records (key, name)
            VALUES ($1, $2::json)
            RETURNING {}
            "#,
            self.tables().roles,
            record_columns("records"),
        );

        let role = sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(input.key.as_str())
            .bind(input.name.to_json()?)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, AccessKind::Role, input.key.as_str()))?
            .into_role()?;

        self.insert_links(
            &mut transaction,
            AssignmentKind::Permission,
            &Role::subject_for(role.id),
            &input.permission_ids,
        )
        .await?;

        let mut records = self
            .role_records(&mut transaction, vec![role], &[RoleRelation::Permissions])
            .await?;
        transaction.commit().await.map_err(commit_error)?;

        let record = records.pop().ok_or_else(|| {
            AppError::Internal(format!("created role '{}' could not be read back", input.key))
        })?;

        tracing::info!(
            role_id = record.role.id,
            role_key = %record.role.key,
            permissions = input.permission_ids.len(),
            "role created"
        );

        Ok(record)
    }

    async fn update_role(
        &self,
        role_id: i64,
        changes: RoleChanges,
    ) -> AppResult<Option<RoleRecord>> {
        let mut transaction = self.begin().await?;
        let sql = format!(
            r#"
            UPDATE {} AS records
            SET key = COALESCE($2, records.key),
                name = COALESCE($3::json, records.name),
                updated_at = now()
            WHERE records.id = $1
            RETURNING {}
            "#,
            self.tables().roles,
            record_columns("records"),
        );
        let name = changes.name.as_ref().map(TranslatableText::to_json).transpose()?;
        let label = changes
            .key
            .clone()
            .unwrap_or_else(|| format!("#{role_id}"));

        let Some(row) = sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(role_id)
            .bind(changes.key.as_deref())
            .bind(name)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, AccessKind::Role, label.as_str()))?
        else {
            return Ok(None);
        };

        if let Some(permission_ids) = &changes.permission_ids {
            let plan = self
                .sync_links(
                    &mut transaction,
                    AssignmentKind::Permission,
                    &Role::subject_for(role_id),
                    permission_ids,
                )
                .await?;
            tracing::debug!(
                role_id,
                attached = plan.attach.len(),
                detached = plan.detach.len(),
                "role permissions synced"
            );
        }

        let records = self
            .role_records(&mut transaction, vec![row.into_role()?], &[RoleRelation::Permissions])
            .await?;
        transaction.commit().await.map_err(commit_error)?;

        Ok(records.into_iter().next())
    }

    async fn delete_role(&self, role_id: i64) -> AppResult<bool> {
        let mut transaction = self.begin().await?;

        self.delete_links(
            &mut transaction,
            AssignmentKind::Permission,
            &Role::subject_for(role_id),
            None,
        )
        .await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables().roles);
        let result = sqlx::query(sql.as_str())
            .bind(role_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        transaction.commit().await.map_err(commit_error)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(role_id, "role deleted with its assignments");
        }

        Ok(deleted)
    }
}
