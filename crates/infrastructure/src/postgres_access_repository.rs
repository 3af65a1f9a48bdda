use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool};

use rolegate_application::{
    AssignmentRepository, CreateGuardInput, EntityFilter, EntityQuery, GroupChanges, GroupRecord,
    GroupRelation, GroupRepository, GuardRecord, GuardRelation, NewGroup, NewRole,
    PermissionGuardRepository, PermissionRecord, PermissionRelation, PermissionRepository,
    RoleChanges, RoleRecord, RoleRelation, RoleRepository, UpdateGuardInput,
};
use rolegate_core::{AppError, AppResult, SubjectRef};
use rolegate_domain::{
    AccessKind, AssignmentKind, EntityRef, Group, GuardedPermission, Permission, PermissionGuard,
    Role, SyncPlan, TranslatableText,
};

use crate::schema::{SchemaNames, TableNames, install_schema};

mod assignments;
mod groups;
mod guards;
mod permissions;
mod roles;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed repository for every access-control port.
#[derive(Clone)]
pub struct PostgresAccessRepository {
    pool: PgPool,
    names: SchemaNames,
}

impl PostgresAccessRepository {
    /// Creates a repository over the default table names.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            names: SchemaNames::default(),
        }
    }

    /// Creates a repository over custom table and column names.
    pub fn with_names(pool: PgPool, names: SchemaNames) -> AppResult<Self> {
        names.validate()?;
        Ok(Self { pool, names })
    }

    /// Installs the tables this repository reads and writes.
    pub async fn install_schema(&self) -> AppResult<()> {
        install_schema(&self.pool, &self.names).await
    }

    fn tables(&self) -> &TableNames {
        &self.names.tables
    }

    async fn connection(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire database connection: {error}"))
        })
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }

    fn link_table(&self, kind: AssignmentKind) -> LinkTable<'_> {
        let tables = self.tables();
        let columns = &self.names.columns;
        match kind {
            AssignmentKind::Role => LinkTable {
                table: tables.role_assignments.as_str(),
                target: "role_id",
                subject_type: "model_type",
                subject_id: columns.model_id.as_str(),
            },
            AssignmentKind::Permission => LinkTable {
                table: tables.permission_assignments.as_str(),
                target: "permission_id",
                subject_type: "model_type",
                subject_id: columns.model_id.as_str(),
            },
            AssignmentKind::Group => LinkTable {
                table: tables.groupables.as_str(),
                target: "group_id",
                subject_type: "groupable_type",
                subject_id: columns.groupable_id.as_str(),
            },
        }
    }

    fn record_table(&self, kind: AccessKind) -> &str {
        let tables = self.tables();
        match kind {
            AccessKind::PermissionGuard => tables.permission_guards.as_str(),
            AccessKind::Permission => tables.permissions.as_str(),
            AccessKind::Role => tables.roles.as_str(),
            AccessKind::Group => tables.groups.as_str(),
        }
    }

    /// Inserts missing links from `subject` to `ids`; returns the number created.
    async fn insert_links(
        &self,
        connection: &mut PgConnection,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: &[i64],
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let link = self.link_table(kind);
        let sql = format!(
            r#"
            INSERT INTO {table} ({target}, {subject_type}, {subject_id})
            SELECT target_id, $2, $3
            FROM UNNEST($1::BIGINT[]) AS target_id
            ON CONFLICT DO NOTHING
            "#,
            table = link.table,
            target = link.target,
            subject_type = link.subject_type,
            subject_id = link.subject_id,
        );

        let result = sqlx::query(sql.as_str())
            .bind(ids)
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .execute(&mut *connection)
            .await
            .map_err(|error| map_link_error(error, kind, subject))?;

        Ok(result.rows_affected())
    }

    async fn delete_links(
        &self,
        connection: &mut PgConnection,
        kind: AssignmentKind,
        subject: &SubjectRef,
        ids: Option<&[i64]>,
    ) -> AppResult<u64> {
        let link = self.link_table(kind);
        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE {subject_type} = $1
              AND {subject_id} = $2
              AND ($3::BIGINT[] IS NULL OR {target} = ANY($3))
            "#,
            table = link.table,
            target = link.target,
            subject_type = link.subject_type,
            subject_id = link.subject_id,
        );

        let result = sqlx::query(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .bind(ids)
            .execute(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to remove {} links of subject '{subject}': {error}",
                    kind.target().as_str()
                ))
            })?;

        Ok(result.rows_affected())
    }

    async fn linked_ids(
        &self,
        connection: &mut PgConnection,
        kind: AssignmentKind,
        subject: &SubjectRef,
    ) -> AppResult<Vec<i64>> {
        let link = self.link_table(kind);
        let sql = format!(
            "SELECT {target} FROM {table} WHERE {subject_type} = $1 AND {subject_id} = $2 ORDER BY id",
            table = link.table,
            target = link.target,
            subject_type = link.subject_type,
            subject_id = link.subject_id,
        );

        sqlx::query_scalar::<_, i64>(sql.as_str())
            .bind(subject.subject_type())
            .bind(subject.subject_id())
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list links of subject '{subject}': {error}"))
            })
    }

    /// Replaces the links of `subject` with exactly `target`.
    async fn sync_links(
        &self,
        connection: &mut PgConnection,
        kind: AssignmentKind,
        subject: &SubjectRef,
        target: &[i64],
    ) -> AppResult<SyncPlan> {
        let current = self.linked_ids(connection, kind, subject).await?;
        let plan = SyncPlan::between(&current, target);
        if plan.is_noop() {
            return Ok(plan);
        }

        if !plan.detach.is_empty() {
            self.delete_links(connection, kind, subject, Some(&plan.detach))
                .await?;
        }
        self.insert_links(connection, kind, subject, &plan.attach)
            .await?;

        Ok(plan)
    }

    async fn guards_by_ids(
        &self,
        connection: &mut PgConnection,
        ids: &[i64],
    ) -> AppResult<HashMap<i64, PermissionGuard>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT {} FROM {} AS records WHERE records.id = ANY($1)",
            record_columns("records"),
            self.tables().permission_guards,
        );
        let rows = sqlx::query_as::<_, RecordRow>(sql.as_str())
            .bind(ids)
            .fetch_all(&mut *connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load permission guards: {error}"))
            })?;

        rows.into_iter()
            .map(|row| row.into_guard().map(|guard| (guard.id, guard)))
            .collect()
    }
}

struct LinkTable<'a> {
    table: &'a str,
    target: &'static str,
    subject_type: &'static str,
    subject_id: &'a str,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: i64,
    key: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_guard(self) -> AppResult<PermissionGuard> {
        Ok(PermissionGuard {
            id: self.id,
            key: self.key,
            name: stored_text(self.name.as_str())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn into_role(self) -> AppResult<Role> {
        Ok(Role {
            id: self.id,
            key: self.key,
            name: stored_text(self.name.as_str())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    key: String,
    name: String,
    permission_guard_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRow {
    fn into_permission(self) -> AppResult<Permission> {
        Ok(Permission {
            id: self.id,
            key: self.key,
            name: stored_text(self.name.as_str())?,
            permission_guard_id: self.permission_guard_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    id: i64,
    key: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self) -> AppResult<Group> {
        Ok(Group {
            id: self.id,
            key: self.key,
            name: stored_text(self.name.as_str())?,
            description: self
                .description
                .as_deref()
                .map(stored_text)
                .transpose()?,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LinkedRecordRow {
    owner_id: i64,
    #[sqlx(flatten)]
    record: RecordRow,
}

#[derive(Debug, FromRow)]
struct LinkedPermissionRow {
    owner_id: i64,
    #[sqlx(flatten)]
    permission: PermissionRow,
}

#[derive(Debug, FromRow)]
struct LinkedGroupRow {
    owner_id: i64,
    #[sqlx(flatten)]
    group: GroupRow,
}

#[derive(Debug, FromRow)]
struct MemberRow {
    group_id: i64,
    member_type: String,
    member_id: i64,
}

fn stored_text(raw: &str) -> AppResult<TranslatableText> {
    TranslatableText::parse(raw)
        .map_err(|error| AppError::Internal(format!("stored translation is invalid: {error}")))
}

fn record_columns(alias: &str) -> String {
    format!(
        "{alias}.id, {alias}.key, {alias}.name::text AS name, {alias}.created_at, {alias}.updated_at"
    )
}

fn permission_columns(alias: &str) -> String {
    format!(
        "{alias}.id, {alias}.key, {alias}.name::text AS name, {alias}.permission_guard_id, \
         {alias}.created_at, {alias}.updated_at"
    )
}

fn group_columns(alias: &str) -> String {
    format!(
        "{alias}.id, {alias}.key, {alias}.name::text AS name, \
         {alias}.description::text AS description, {alias}.is_active, \
         {alias}.created_at, {alias}.updated_at"
    )
}

/// Filter over `$1` (key) and `$2`/`$3` (name locale and value).
fn filter_clause(alias: &str) -> String {
    format!(
        "($1::TEXT IS NULL OR {alias}.key = $1) \
         AND ($2::TEXT IS NULL OR {alias}.name ->> $2::TEXT = $3::TEXT)"
    )
}

fn reference_column(reference: &EntityRef) -> &'static str {
    match reference {
        EntityRef::Id(_) => "id",
        EntityRef::Key(_) => "key",
    }
}

async fn fetch_filtered<R>(
    connection: &mut PgConnection,
    sql: &str,
    filter: &EntityFilter,
    label: &str,
) -> AppResult<Vec<R>>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let (locale, value) = match &filter.name {
        Some(name) => (Some(name.locale.as_str()), Some(name.value.as_str())),
        None => (None, None),
    };

    sqlx::query_as::<_, R>(sql)
        .bind(filter.key.as_deref())
        .bind(locale)
        .bind(value)
        .fetch_all(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list {label}: {error}")))
}

async fn fetch_by_reference<R>(
    connection: &mut PgConnection,
    sql: &str,
    reference: &EntityRef,
    label: &str,
) -> AppResult<Option<R>>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let query = sqlx::query_as::<_, R>(sql);
    let query = match reference {
        EntityRef::Id(id) => query.bind(*id),
        EntityRef::Key(key) => query.bind(key.as_str()),
    };

    query
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find {label} {reference}: {error}")))
}

fn group_by_owner<T>(
    pairs: impl IntoIterator<Item = AppResult<(i64, T)>>,
) -> AppResult<HashMap<i64, Vec<T>>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for pair in pairs {
        let (owner_id, value) = pair?;
        grouped.entry(owner_id).or_default().push(value);
    }

    Ok(grouped)
}

fn map_write_error(error: sqlx::Error, kind: AccessKind, key: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "{} key '{key}' already exists",
                    kind.as_str()
                ));
            }
            Some("23503") => {
                return AppError::NotFound(format!(
                    "{} '{key}' references a record that does not exist",
                    kind.as_str()
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to persist {} '{key}': {error}", kind.as_str()))
}

fn map_link_error(error: sqlx::Error, kind: AssignmentKind, subject: &SubjectRef) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound(format!(
            "cannot link subject '{subject}' to a {} that does not exist",
            kind.target().as_str()
        ));
    }

    AppError::Internal(format!(
        "failed to link {} records to subject '{subject}': {error}",
        kind.target().as_str()
    ))
}

fn commit_error(error: sqlx::Error) -> AppError {
    AppError::Internal(format!("failed to commit transaction: {error}"))
}
