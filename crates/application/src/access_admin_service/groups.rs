use super::*;

use crate::access_ports::{
    CreateGroupInput, EntityFilter, EntityQuery, GroupChanges, GroupRecord, GroupRelation,
    Listing, NewGroup, UpdateGroupInput,
};

impl AccessAdminService {
    /// Lists groups, or returns the query unexecuted when `materialize` is false.
    pub async fn list_groups(
        &self,
        filter: EntityFilter,
        relations: &[GroupRelation],
        materialize: bool,
    ) -> AppResult<Listing<GroupRecord, GroupRelation>> {
        let query = EntityQuery::from_parts(filter, relations);
        if !materialize {
            return Ok(Listing::Deferred(query));
        }

        self.fetch_groups(&query).await.map(Listing::Records)
    }

    /// Executes a group query.
    pub async fn fetch_groups(
        &self,
        query: &EntityQuery<GroupRelation>,
    ) -> AppResult<Vec<GroupRecord>> {
        self.repositories.groups.list_groups(query).await
    }

    /// Finds a group by numeric id or key.
    pub async fn show_group(
        &self,
        id_or_key: impl Into<EntityRef>,
        relations: &[GroupRelation],
    ) -> AppResult<Option<GroupRecord>> {
        self.repositories
            .groups
            .find_group(&id_or_key.into(), relations)
            .await
    }

    /// Creates a group holding exactly the referenced roles.
    pub async fn create_group(&self, input: CreateGroupInput) -> AppResult<GroupRecord> {
        let key = validate_key(input.key.as_str())?;
        let role_ids = self.resolve_ids(AccessKind::Role, &input.roles).await?;

        self.repositories
            .groups
            .create_group(NewGroup {
                key,
                name: input.name,
                description: input.description,
                is_active: input.is_active,
                role_ids,
            })
            .await
    }

    /// Updates a group; a provided role list replaces the current set.
    pub async fn update_group(
        &self,
        group_id: i64,
        input: UpdateGroupInput,
    ) -> AppResult<Option<GroupRecord>> {
        let key = validate_optional_key(input.key)?;
        let role_ids = match input.roles {
            Some(references) => Some(self.resolve_ids(AccessKind::Role, &references).await?),
            None => None,
        };

        self.repositories
            .groups
            .update_group(
                group_id,
                GroupChanges {
                    key,
                    name: input.name,
                    description: input.description,
                    is_active: input.is_active,
                    role_ids,
                },
            )
            .await
    }

    /// Deletes a group after detaching its roles and members.
    pub async fn delete_group(&self, group_id: i64) -> AppResult<bool> {
        self.repositories.groups.delete_group(group_id).await
    }
}
