use serde::{Deserialize, Serialize};

/// Match on one locale of the `name` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Locale looked up inside `name`.
    pub locale: String,
    /// Exact text expected for that locale.
    pub value: String,
}

/// Filters shared by every record kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Exact key match.
    pub key: Option<String>,
    /// `name[locale] == value` match.
    pub name: Option<NameFilter>,
}

/// Composable, not yet executed list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery<R> {
    /// Row filter.
    pub filter: EntityFilter,
    /// Relations attached to each record.
    pub relations: Vec<R>,
}

impl<R: Copy + PartialEq> EntityQuery<R> {
    /// Creates a query matching every record without relations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: EntityFilter::default(),
            relations: Vec::new(),
        }
    }

    /// Creates a query from a filter and a relation list.
    #[must_use]
    pub fn from_parts(filter: EntityFilter, relations: &[R]) -> Self {
        relations
            .iter()
            .fold(Self { filter, relations: Vec::new() }, |query, relation| {
                query.with_relation(*relation)
            })
    }

    /// Restricts the query to one key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.filter.key = Some(key.into());
        self
    }

    /// Restricts the query to records whose `name[locale]` equals `value`.
    #[must_use]
    pub fn with_name(mut self, locale: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.name = Some(NameFilter {
            locale: locale.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a relation to attach.
    #[must_use]
    pub fn with_relation(mut self, relation: R) -> Self {
        if !self.relations.contains(&relation) {
            self.relations.push(relation);
        }
        self
    }

    /// Returns whether a relation is requested.
    #[must_use]
    pub fn includes(&self, relation: R) -> bool {
        self.relations.contains(&relation)
    }
}

impl<R: Copy + PartialEq> Default for EntityQuery<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a list call: executed records or the deferred query.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<T, R> {
    /// Query was executed.
    Records(Vec<T>),
    /// Query was returned for further composition.
    Deferred(EntityQuery<R>),
}

impl<T, R> Listing<T, R> {
    /// Returns executed records, if any.
    #[must_use]
    pub fn into_records(self) -> Option<Vec<T>> {
        match self {
            Self::Records(records) => Some(records),
            Self::Deferred(_) => None,
        }
    }

    /// Returns the deferred query, if the listing was not materialized.
    #[must_use]
    pub fn into_query(self) -> Option<EntityQuery<R>> {
        match self {
            Self::Records(_) => None,
            Self::Deferred(query) => Some(query),
        }
    }
}

/// Relations attachable to a permission guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRelation {
    /// Owned permissions.
    Permissions,
}

/// Relations attachable to a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionRelation {
    /// Owning guard.
    Guard,
    /// Roles granting the permission.
    Roles,
}

/// Relations attachable to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleRelation {
    /// Granted permissions.
    Permissions,
    /// Groups holding the role.
    Groups,
}

/// Relations attachable to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRelation {
    /// Roles held by the group.
    Roles,
    /// Member subjects.
    Members,
}

#[cfg(test)]
mod tests {
    use super::{EntityQuery, Listing, RoleRelation};

    #[test]
    fn query_composition_deduplicates_relations() {
        let query = EntityQuery::from_parts(
            Default::default(),
            &[RoleRelation::Permissions, RoleRelation::Permissions],
        )
        .with_relation(RoleRelation::Groups)
        .with_key("editor")
        .with_name("en", "Editor");

        assert_eq!(
            query.relations,
            vec![RoleRelation::Permissions, RoleRelation::Groups]
        );
        assert!(query.includes(RoleRelation::Groups));
        assert_eq!(query.filter.key.as_deref(), Some("editor"));
        assert_eq!(
            query.filter.name.as_ref().map(|name| name.locale.as_str()),
            Some("en")
        );
    }

    #[test]
    fn deferred_listing_exposes_only_query() {
        let listing: Listing<(), RoleRelation> = Listing::Deferred(EntityQuery::new());
        assert!(listing.clone().into_records().is_none());
        assert!(listing.into_query().is_some());
    }
}
