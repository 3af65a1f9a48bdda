use super::*;

use crate::access_ports::{
    EntityFilter, EntityQuery, Listing, PermissionRecord, PermissionRelation,
};

impl AccessAdminService {
    /// Lists permissions, or returns the query unexecuted when `materialize` is false.
    pub async fn list_permissions(
        &self,
        filter: EntityFilter,
        relations: &[PermissionRelation],
        materialize: bool,
    ) -> AppResult<Listing<PermissionRecord, PermissionRelation>> {
        let query = EntityQuery::from_parts(filter, relations);
        if !materialize {
            return Ok(Listing::Deferred(query));
        }

        self.fetch_permissions(&query).await.map(Listing::Records)
    }

    /// Executes a permission query.
    pub async fn fetch_permissions(
        &self,
        query: &EntityQuery<PermissionRelation>,
    ) -> AppResult<Vec<PermissionRecord>> {
        self.repositories.permissions.list_permissions(query).await
    }

    /// Finds a permission by numeric id or key.
    pub async fn show_permission(
        &self,
        id_or_key: impl Into<EntityRef>,
        relations: &[PermissionRelation],
    ) -> AppResult<Option<PermissionRecord>> {
        self.repositories
            .permissions
            .find_permission(&id_or_key.into(), relations)
            .await
    }
}
