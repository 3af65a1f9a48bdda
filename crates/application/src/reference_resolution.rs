use rolegate_core::AppResult;
use rolegate_domain::{AccessKind, EntityRef, ReferenceSet, ensure_keys_resolved};

use crate::AssignmentRepository;

/// Resolves references to ids, failing on keys that match no record.
pub(crate) async fn resolve_reference_ids(
    repository: &dyn AssignmentRepository,
    kind: AccessKind,
    references: &[EntityRef],
) -> AppResult<Vec<i64>> {
    match ReferenceSet::classify(references)? {
        ReferenceSet::Empty => Ok(Vec::new()),
        ReferenceSet::Ids(ids) => Ok(ids),
        ReferenceSet::Keys(keys) => {
            let resolved = repository.resolve_keys(kind, &keys).await?;
            ensure_keys_resolved(kind.as_str(), &keys, &resolved)
        }
    }
}

/// Resolves references to ids, skipping keys that match no record.
pub(crate) async fn resolve_existing_ids(
    repository: &dyn AssignmentRepository,
    kind: AccessKind,
    references: &[EntityRef],
) -> AppResult<Vec<i64>> {
    match ReferenceSet::classify(references)? {
        ReferenceSet::Empty => Ok(Vec::new()),
        ReferenceSet::Ids(ids) => Ok(ids),
        ReferenceSet::Keys(keys) => Ok(repository
            .resolve_keys(kind, &keys)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect()),
    }
}
