use super::*;

use crate::access_ports::{
    CreateGuardInput, EntityFilter, EntityQuery, GuardPermissionInput, GuardRecord,
    GuardRelation, Listing, UpdateGuardInput,
};

impl AccessAdminService {
    /// Lists guards, or returns the query unexecuted when `materialize` is false.
    pub async fn list_guards(
        &self,
        filter: EntityFilter,
        relations: &[GuardRelation],
        materialize: bool,
    ) -> AppResult<Listing<GuardRecord, GuardRelation>> {
        let query = EntityQuery::from_parts(filter, relations);
        if !materialize {
            return Ok(Listing::Deferred(query));
        }

        self.fetch_guards(&query).await.map(Listing::Records)
    }

    /// Executes a guard query.
    pub async fn fetch_guards(
        &self,
        query: &EntityQuery<GuardRelation>,
    ) -> AppResult<Vec<GuardRecord>> {
        self.repositories.guards.list_guards(query).await
    }

    /// Finds a guard by numeric id or key.
    pub async fn show_guard(
        &self,
        id_or_key: impl Into<EntityRef>,
        relations: &[GuardRelation],
    ) -> AppResult<Option<GuardRecord>> {
        self.repositories
            .guards
            .find_guard(&id_or_key.into(), relations)
            .await
    }

    /// Creates a guard together with its nested permissions.
    pub async fn create_guard(&self, input: CreateGuardInput) -> AppResult<GuardRecord> {
        let input = CreateGuardInput {
            key: validate_key(input.key.as_str())?,
            name: input.name,
            permissions: validate_permission_inputs(input.permissions)?,
        };

        self.repositories.guards.create_guard(input).await
    }

    /// Updates a guard and upserts its nested permissions.
    pub async fn update_guard(
        &self,
        guard_id: i64,
        input: UpdateGuardInput,
    ) -> AppResult<Option<GuardRecord>> {
        let input = UpdateGuardInput {
            key: validate_optional_key(input.key)?,
            name: input.name,
            permissions: validate_permission_inputs(input.permissions)?,
        };

        self.repositories.guards.update_guard(guard_id, input).await
    }

    /// Deletes a guard, its permissions and every assignment of those permissions.
    pub async fn delete_guard(&self, guard_id: i64) -> AppResult<bool> {
        self.repositories.guards.delete_guard(guard_id).await
    }
}

fn validate_permission_inputs(
    permissions: Vec<GuardPermissionInput>,
) -> AppResult<Vec<GuardPermissionInput>> {
    permissions
        .into_iter()
        .map(|permission| {
            Ok(GuardPermissionInput {
                id: permission.id,
                key: validate_key(permission.key.as_str())?,
                name: permission.name,
            })
        })
        .collect()
}
