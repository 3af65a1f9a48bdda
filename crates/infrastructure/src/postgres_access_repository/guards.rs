use super::*;

use rolegate_application::GuardPermissionInput;

impl PostgresAccessRepository {
    async fn permissions_of_guards(
        &self,
        connection: &mut PgConnection,
        guard_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<Permission>>> {
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.permission_guard_id = ANY($1) ORDER BY records.id",
            permission_columns("records"),
            self.tables().permissions,
        );
        let rows = sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(guard_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load guard permissions: {error}"))
            })?;

        group_by_owner(rows.into_iter().map(|row| {
            let guard_id = row.permission_guard_id;
            row.into_permission().map(|permission| (guard_id, permission))
        }))
    }

    async fn guard_records(
        &self,
        connection: &mut PgConnection,
        guards: Vec<PermissionGuard>,
        relations: &[GuardRelation],
    ) -> AppResult<Vec<GuardRecord>> {
        let mut permissions = if relations.contains(&GuardRelation::Permissions) {
            let ids: Vec<i64> = guards.iter().map(|guard| guard.id).collect();
            Some(self.permissions_of_guards(connection, &ids).await?)
        } else {
            None
        };

        Ok(guards
            .into_iter()
            .map(|guard| GuardRecord {
                permissions: permissions
                    .as_mut()
                    .map(|by_guard| by_guard.remove(&guard.id).unwrap_or_default()),
                guard,
            })
            .collect())
    }

    async fn insert_guard_permission(
        &self,
        connection: &mut PgConnection,
        guard_id: i64,
        input: &GuardPermissionInput,
    ) -> AppResult<Permission> {
        let sql = format!(
            r#"
            INSERT INTO {} AS records (key, name, permission_guard_id)
            VALUES ($1, $2::json, $3)
            RETURNING {}
            "#,
            self.tables().permissions,
            permission_columns("records"),
        );

        sqlx::query_as::<_, PermissionRow>(sql.as_str())
            .bind(input.key.as_str())
            .bind(input.name.to_json()?)
            .bind(guard_id)
            .fetch_one(&mut *connection)
            .await
            .map_err(|error| map_write_error(error, AccessKind::Permission, input.key.as_str()))?
            .into_permission()
    }

    /// Matches by id within the guard when given, otherwise by key.
    async fn upsert_guard_permission(
        &self,
        connection: &mut PgConnection,
        guard_id: i64,
        input: &GuardPermissionInput,
    ) -> AppResult<Permission> {
        let permissions = self.tables().permissions.as_str();
        let columns = permission_columns("records");

        if let Some(permission_id) = input.id {
            let sql = format!(
                r#"
                UPDATE {permissions} AS records
                SET key = $3, name = $4::json, updated_at = now()
                WHERE records.id = $1 AND records.permission_guard_id = $2
                RETURNING {columns}
                "#
            );

            let row = sqlx::query_as::<_, PermissionRow>(sql.as_str())
                .bind(permission_id)
                .bind(guard_id)
                .bind(input.key.as_str())
                .bind(input.name.to_json()?)
                .fetch_optional(&mut *connection)
                .await
                .map_err(|error| {
                    map_write_error(error, AccessKind::Permission, input.key.as_str())
                })?;

            return match row {
                Some(row) => row.into_permission(),
                None => Err(AppError::NotFound(format!(
                    "permission #{permission_id} does not belong to guard #{guard_id}"
                ))),
            };
        }

        let owner = sqlx::query_scalar::<_, i64>(
            format!("SELECT permission_guard_id FROM {permissions} WHERE key = $1").as_str(),
        )
        .bind(input.key.as_str())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to look up permission: {error}")))?;

        match owner {
            None => {
                self.insert_guard_permission(connection, guard_id, input)
                    .await
            }
            Some(owner) if owner != guard_id => Err(AppError::Conflict(format!(
                "permission '{}' belongs to guard #{owner}",
                input.key
            ))),
            Some(_) => {
                let sql = format!(
                    r#"
                    UPDATE {permissions} AS records
                    SET name = $2::json, updated_at = now()
                    WHERE records.key = $1
                    RETURNING {columns}
                    "#
                );

                sqlx::query_as::<_, PermissionRow>(sql.as_str())
                    .bind(input.key.as_str())
                    .bind(input.name.to_json()?)
                    .fetch_one(&mut *connection)
                    .await
                    .map_err(|error| {
                        map_write_error(error, AccessKind::Permission, input.key.as_str())
                    })?
                    .into_permission()
            }
        }
    }
}

#[async_trait]
impl PermissionGuardRepository for PostgresAccessRepository {
    async fn list_guards(
        &self,
        query: &EntityQuery<GuardRelation>,
    ) -> AppResult<Vec<GuardRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE {} ORDER BY records.id",
            record_columns("records"),
            self.tables().permission_guards,
            filter_clause("records"),
        );

        let rows: Vec<RecordRow> =
            fetch_filtered(&mut connection, sql.as_str(), &query.filter, "permission guards")
                .await?;
        let guards = rows
            .into_iter()
            .map(RecordRow::into_guard)
            .collect::<AppResult<Vec<_>>>()?;

        self.guard_records(&mut connection, guards, &query.relations)
            .await
    }

    async fn find_guard(
        &self,
        reference: &EntityRef,
        relations: &[GuardRelation],
    ) -> AppResult<Option<GuardRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.{} = $1",
            record_columns("records"),
            self.tables().permission_guards,
            reference_column(reference),
        );

        let Some(row) = fetch_by_reference::<RecordRow>(
            &mut connection,
            sql.as_str(),
            reference,
            "permission guard",
        )
        .await?
        else {
            return Ok(None);
        };

        let records = self
            .guard_records(&mut connection, vec![row.into_guard()?], relations)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn create_guard(&self, input: CreateGuardInput) -> AppResult<GuardRecord> {
        let mut transaction = self.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO {} AS records (key, name)
            VALUES ($1, $2::json)
            RETURNING {}
            "#,
            self.tables().permission_guards,
            record_columns("records"),
        );

        let guard = sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(input.key.as_str())
            .bind(input.name.to_json()?)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                map_write_error(error, AccessKind::PermissionGuard, input.key.as_str())
            })?
            .into_guard()?;

        let mut permissions = Vec::with_capacity(input.permissions.len());
        for permission in &input.permissions {
            permissions.push(
                self.insert_guard_permission(&mut transaction, guard.id, permission)
                    .await?,
            );
        }

        transaction.commit().await.map_err(commit_error)?;

        tracing::info!(
            guard_id = guard.id,
            guard_key = %guard.key,
            permissions = permissions.len(),
            "permission guard created"
        );

        Ok(GuardRecord {
            guard,
            permissions: Some(permissions),
        })
    }

    async fn update_guard(
        &self,
        guard_id: i64,
        input: UpdateGuardInput,
    ) -> AppResult<Option<GuardRecord>> {
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
            self.tables().permission_guards,
            record_columns("records"),
        );
        let name = input.name.as_ref().map(TranslatableText::to_json).transpose()?;
        let label = input
            .key
            .clone()
            .unwrap_or_else(|| format!("#{guard_id}"));

        let Some(row) = sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(guard_id)
            .bind(input.key.as_deref())
            .bind(name)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, AccessKind::PermissionGuard, label.as_str()))?
        else {
            return Ok(None);
        };
        let guard = row.into_guard()?;

        for permission in &input.permissions {
            self.upsert_guard_permission(&mut transaction, guard_id, permission)
                .await?;
        }

        let mut permissions = self
            .permissions_of_guards(&mut transaction, &[guard_id])
            .await?;
        transaction.commit().await.map_err(commit_error)?;

        tracing::info!(
            guard_id,
            upserted = input.permissions.len(),
            "permission guard updated"
        );

        Ok(Some(GuardRecord {
            guard,
            permissions: Some(permissions.remove(&guard_id).unwrap_or_default()),
        }))
    }

    async fn delete_guard(&self, guard_id: i64) -> AppResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables().permission_guards);
        let result = sqlx::query(sql.as_str())
            .bind(guard_id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete permission guard: {error}"))
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(guard_id, "permission guard deleted with its permissions");
        }

        Ok(deleted)
    }
}
