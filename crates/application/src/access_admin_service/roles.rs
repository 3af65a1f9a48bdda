use super::*;

use crate::access_ports::{
    CreateRoleInput, EntityFilter, EntityQuery, Listing, NewRole, RoleChanges, RoleRecord,
    RoleRelation, UpdateRoleInput,
};

impl AccessAdminService {
    /// Lists roles, or returns the query unexecuted when `materialize` is false.
    pub async fn list_roles(
        &self,
        filter: EntityFilter,
        relations: &[RoleRelation],
        materialize: bool,
    ) -> AppResult<Listing<RoleRecord, RoleRelation>> {
        let query = EntityQuery::from_parts(filter, relations);
        if !materialize {
            return Ok(Listing::Deferred(query));
        }

        self.fetch_roles(&query).await.map(Listing::Records)
    }

    /// Executes a role query.
    pub async fn fetch_roles(&self, query: &EntityQuery<RoleRelation>) -> AppResult<Vec<RoleRecord>> {
        self.repositories.roles.list_roles(query).await
    }

    /// Finds a role by numeric id or key.
    pub async fn show_role(
        &self,
        id_or_key: impl Into<EntityRef>,
        relations: &[RoleRelation],
    ) -> AppResult<Option<RoleRecord>> {
        self.repositories
            .roles
            .find_role(&id_or_key.into(), relations)
            .await
    }

    /// Creates a role linked to exactly the referenced permissions.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleRecord> {
        let key = validate_key(input.key.as_str())?;
        let permission_ids = self
            .resolve_ids(AccessKind::Permission, &input.permissions)
            .await?;

        self.repositories
            .roles
            .create_role(NewRole {
                key,
                name: input.name,
                permission_ids,
            })
            .await
    }

    /// Updates a role; a provided permission list replaces the current set.
    pub async fn update_role(
        &self,
        role_id: i64,
        input: UpdateRoleInput,
    ) -> AppResult<Option<RoleRecord>> {
        let key = validate_optional_key(input.key)?;
        let permission_ids = match input.permissions {
            Some(references) => Some(
                self.resolve_ids(AccessKind::Permission, &references)
                    .await?,
            ),
            None => None,
        };

        self.repositories
            .roles
            .update_role(
                role_id,
                RoleChanges {
                    key,
                    name: input.name,
                    permission_ids,
                },
            )
            .await
    }

    /// Deletes a role after detaching its permissions and holders.
    pub async fn delete_role(&self, role_id: i64) -> AppResult<bool> {
        self.repositories.roles.delete_role(role_id).await
    }
}
