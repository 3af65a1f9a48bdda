use rolegate_core::{AppError, AppResult};
use sqlx::PgPool;


/// Table names used by the access-control schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Guard table.
    pub permission_guards: String,
    /// Permission table.
    pub permissions: String,
    /// Role table.
    pub roles: String,
    /// Group table.
    pub groups: String,
    /// Subject role links.
    pub role_assignments: String,
    /// Subject permission links.
    pub permission_assignments: String,
    /// Group membership links.
    pub groupables: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            permission_guards: "permission_guards".to_owned(),
            permissions: "permissions".to_owned(),
            roles: "roles".to_owned(),
            groups: "groups".to_owned(),
            role_assignments: "role_assignments".to_owned(),
            permission_assignments: "permission_assignments".to_owned(),
            groupables: "groupables".to_owned(),
        }
    }
}

/// Subject id columns of the polymorphic link tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphColumns {
    /// Subject id column in role and permission links.
    pub model_id: String,
    /// Member id column in group membership links.
    pub groupable_id: String,
}

impl Default for MorphColumns {
    fn default() -> Self {
        Self {
            model_id: "model_id".to_owned(),
            groupable_id: "groupable_id".to_owned(),
        }
    }
}

/// Configurable identifiers of the access-control schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaNames {
    /// Table names.
    pub tables: TableNames,
    /// Polymorphic id columns.
    pub columns: MorphColumns,
}

impl SchemaNames {
    /// Checks that every configured name is a plain SQL identifier.
    ///
    /// Names are interpolated into statements, so only ASCII letters, digits
    /// and underscores are accepted, and the first character must not be a digit.
    pub fn validate(&self) -> AppResult<()> {
        let tables = &self.tables;
        for (label, value) in [
            ("permission_guards", &tables.permission_guards),
            ("permissions", &tables.permissions),
            ("roles", &tables.roles),
            ("groups", &tables.groups),
            ("role_assignments", &tables.role_assignments),
            ("permission_assignments", &tables.permission_assignments),
            ("groupables", &tables.groupables),
            ("model_id", &self.columns.model_id),
            ("groupable_id", &self.columns.groupable_id),
        ] {
            validate_identifier(label, value)?;
        }

        Ok(())
    }
}

fn validate_identifier(label: &str, value: &str) -> AppResult<()> {
    let mut characters = value.chars();
    let valid_start = characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let valid_rest = characters.all(|character| character.is_ascii_alphanumeric() || character == '_');

    if valid_start && valid_rest && value.len() <= 63 {
        return Ok(());
    }

    Err(AppError::Validation(format!(
        "schema name '{label}' must be a plain SQL identifier, got '{value}'"
    )))
}

/// Returns the idempotent DDL statements for the configured names.
#[must_use]
pub fn schema_statements(names: &SchemaNames) -> Vec<String> {
    let TableNames {
        permission_guards,
        permissions,
        roles,
        groups,
        role_assignments,
        permission_assignments,
        groupables,
    } = &names.tables;
    let model_id = names.columns.model_id.as_str();
    let groupable_id = names.columns.groupable_id.as_str();

    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {permission_guards} (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name JSON NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {permissions} (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name JSON NOT NULL,
                permission_guard_id BIGINT NOT NULL
                    REFERENCES {permission_guards} (id) ON DELETE CASCADE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {permissions}_guard_index ON {permissions} (permission_guard_id)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {roles} (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name JSON NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {groups} (
                id BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                name JSON NOT NULL,
                description JSON NULL,
                is_active BOOLEAN NOT NULL DEFAULT true,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {role_assignments} (
                id BIGSERIAL PRIMARY KEY,
                role_id BIGINT NOT NULL REFERENCES {roles} (id) ON DELETE CASCADE,
                model_type TEXT NOT NULL,
                {model_id} BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT {role_assignments}_unique UNIQUE (role_id, model_type, {model_id})
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {role_assignments}_subject_index ON {role_assignments} ({model_id}, model_type)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {permission_assignments} (
                id BIGSERIAL PRIMARY KEY,
                permission_id BIGINT NOT NULL
                    REFERENCES {permissions} (id) ON DELETE CASCADE,
                model_type TEXT NOT NULL,
                {model_id} BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT {permission_assignments}_unique
                    UNIQUE (permission_id, model_type, {model_id})
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {permission_assignments}_subject_index ON {permission_assignments} ({model_id}, model_type)"
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {groupables} (
                id BIGSERIAL PRIMARY KEY,
                group_id BIGINT NOT NULL REFERENCES {groups} (id) ON DELETE CASCADE,
                groupable_type TEXT NOT NULL,
                {groupable_id} BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                CONSTRAINT {groupables}_unique UNIQUE (group_id, groupable_type, {groupable_id})
            )
            "#
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {groupables}_member_index ON {groupables} ({groupable_id}, groupable_type)"
        ),
    ]
}

/// Creates every access-control table and index that does not exist yet.
pub async fn install_schema(pool: &PgPool, names: &SchemaNames) -> AppResult<()> {
    names.validate()?;

    let mut transaction = pool
        .begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))?;

    for statement in schema_statements(names) {
        sqlx::query(statement.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to install access-control schema: {error}"))
            })?;
    }

    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))?;

    tracing::info!(
        tables = ?names.tables,
        "access-control schema installed"
    );

    Ok(())
}
