use super::*;

impl PostgresAccessRepository {
    async fn roles_of_groups(
        &self,
        connection: &mut PgConnection,
        group_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<Role>>> {
        let sql = format!(
            r#"
            SELECT links.{model_id} AS owner_id, {columns}
            FROM {links} AS links
            INNER JOIN {roles} AS records ON records.id = links.role_id
            WHERE links.model_type = $1 AND links.{model_id} = ANY($2)
            ORDER BY records.id
            "#,
            columns = record_columns("records"),
            links = self.tables().role_assignments,
            roles = self.tables().roles,
            model_id = self.names.columns.model_id,
        );

        let rows = sqlx::query_as::<_, LinkedRecordRow>(sql.as_str())
            .bind(SubjectRef::internal_type(Group::SUBJECT_KIND))
            .bind(group_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load group roles: {error}")))?;

        group_by_owner(
            rows.into_iter()
                .map(|row| row.record.into_role().map(|role| (row.owner_id, role))),
        )
    }

    async fn members_of_groups(
        &self,
        connection: &mut PgConnection,
        group_ids: &[i64],
    ) -> AppResult<HashMap<i64, Vec<SubjectRef>>> {
        let sql = format!(
            r#"
            SELECT group_id, groupable_type AS member_type, {member_id} AS member_id
            FROM {groupables}
            WHERE group_id = ANY($1)
            ORDER BY id
            "#,
            member_id = self.names.columns.groupable_id,
            groupables = self.tables().groupables,
        );

        let rows = sqlx::query_as::<_, MemberRow>(sql.as_str())
            .bind(group_ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load group members: {error}"))
            })?;

        group_by_owner(rows.into_iter().map(|row| {
            Ok((
                row.group_id,
                SubjectRef::from_storage(row.member_type, row.member_id),
            ))
        }))
    }

    async fn group_records(
        &self,
        connection: &mut PgConnection,
        groups: Vec<Group>,
        relations: &[GroupRelation],
    ) -> AppResult<Vec<GroupRecord>> {
        let ids: Vec<i64> = groups.iter().map(|group| group.id).collect();

        let mut roles = if relations.contains(&GroupRelation::Roles) {
            Some(self.roles_of_groups(connection, &ids).await?)
        } else {
            None
        };

        let mut members = if relations.contains(&GroupRelation::Members) {
            Some(self.members_of_groups(connection, &ids).await?)
        } else {
            None
        };

        Ok(groups
            .into_iter()
            .map(|group| GroupRecord {
                roles: roles
                    .as_mut()
                    .map(|by_group| by_group.remove(&group.id).unwrap_or_default()),
                members: members
                    .as_mut()
                    .map(|by_group| by_group.remove(&group.id).unwrap_or_default()),
                group,
            })
            .collect())
    }
}

#[async_trait]
impl GroupRepository for PostgresAccessRepository {
    async fn list_groups(
        &self,
        query: &EntityQuery<GroupRelation>,
    ) -> AppResult<Vec<GroupRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE {} ORDER BY records.id",
            group_columns("records"),
            self.tables().groups,
            filter_clause("records"),
        );

        let rows: Vec<GroupRow> =
            fetch_filtered(&mut connection, sql.as_str(), &query.filter, "groups").await?;
        let groups = rows
            .into_iter()
            .map(GroupRow::into_group)
            .collect::<AppResult<Vec<_>>>()?;

        self.group_records(&mut connection, groups, &query.relations)
            .await
    }

    async fn find_group(
        &self,
        reference: &EntityRef,
        relations: &[GroupRelation],
    ) -> AppResult<Option<GroupRecord>> {
        let mut connection = self.connection().await?;
        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.{} = $1",
            group_columns("records"),
            self.tables().groups,
            reference_column(reference),
        );

        let Some(row) =
            fetch_by_reference::<GroupRow>(&mut connection, sql.as_str(), reference, "group")
                .await?
        else {
            return Ok(None);
        };

        let records = self
            .group_records(&mut connection, vec![row.into_group()?], relations)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn create_group(&self, input: NewGroup) -> AppResult<GroupRecord> {
        let mut transaction = self.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO {} AS records (key, name, description, is_active)
            VALUES ($1, $2::json, $3::json, $4)
            RETURNING {}
            "#,
            self.tables().groups,
            group_columns("records"),
        );
        let description = input
            .description
            .as_ref()
            .map(TranslatableText::to_json)
            .transpose()?;

        let group = sqlx::query_as::<_, GroupRow>(sql.as_str())
            .bind(input.key.as_str())
            .bind(input.name.to_json()?)
            .bind(description)
            .bind(input.is_active)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, AccessKind::Group, input.key.as_str()))?
            .into_group()?;

        self.insert_links(
            &mut transaction,
            AssignmentKind::Role,
            &Group::subject_for(group.id),
            &input.role_ids,
        )
        .await?;

        let mut records = self
            .group_records(&mut transaction, vec![group], &[GroupRelation::Roles])
            .await?;
        transaction.commit().await.map_err(commit_error)?;

        let record = records.pop().ok_or_else(|| {
            AppError::Internal(format!("created group '{}' could not be read back", input.key))
        })?;

        tracing::info!(
            group_id = record.group.id,
            group_key = %record.group.key,
            roles = input.role_ids.len(),
            "group created"
        );

        Ok(record)
    }

    async fn update_group(
        &self,
        group_id: i64,
        changes: GroupChanges,
    ) -> AppResult<Option<GroupRecord>> {
        let mut transaction = self.begin().await?;
        let sql = format!(
            r#"
            UPDATE {} AS records
            SET key = COALESCE($2, records.key),
                name = COALESCE($3::json, records.name),
                description = COALESCE($4::json, records.description),
                is_active = COALESCE($5, records.is_active),
                updated_at = now()
            WHERE records.id = $1
            RETURNING {}
            "#,
            self.tables().groups,
            group_columns("records"),
        );
        let name = changes.name.as_ref().map(TranslatableText::to_json).transpose()?;
        let description = changes
            .description
            .as_ref()
            .map(TranslatableText::to_json)
            .transpose()?;
        let label = changes
            .key
            .clone()
            .unwrap_or_else(|| format!("#{group_id}"));

        let Some(row) = sqlx::query_as::<_, GroupRow>(sql.as_str())
            .bind(group_id)
            .bind(changes.key.as_deref())
            .bind(name)
            .bind(description)
            .bind(changes.is_active)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, AccessKind::Group, label.as_str()))?
        else {
            return Ok(None);
        };

        if let Some(role_ids) = &changes.role_ids {
            let plan = self
                .sync_links(
                    &mut transaction,
                    AssignmentKind::Role,
                    &Group::subject_for(group_id),
                    role_ids,
                )
                .await?;
            tracing::debug!(
                group_id,
                attached = plan.attach.len(),
                detached = plan.detach.len(),
                "group roles synced"
            );
        }

        let records = self
            .group_records(&mut transaction, vec![row.into_group()?], &[GroupRelation::Roles])
            .await?;
        transaction.commit().await.map_err(commit_error)?;

        Ok(records.into_iter().next())
    }

    async fn delete_group(&self, group_id: i64) -> AppResult<bool> {
        let mut transaction = self.begin().await?;

        self.delete_links(
            &mut transaction,
            AssignmentKind::Role,
            &Group::subject_for(group_id),
            None,
        )
        .await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", self.tables().groups);
        let result = sqlx::query(sql.as_str())
            .bind(group_id)
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete group: {error}")))?;

        transaction.commit().await.map_err(commit_error)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(group_id, "group deleted with its members and roles");
        }

        Ok(deleted)
    }
}
