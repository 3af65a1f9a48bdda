use std::fmt::{Display, Formatter};

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Reference to an access-control record by numeric id or by key.
///
/// Deserialized strings go through [`EntityRef::parse`], so `"12"` is an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawEntityRef")]
pub enum EntityRef {
    /// Surrogate id.
    Id(i64),
    /// Unique human-readable key.
    Key(String),
}

impl EntityRef {
    /// Interprets caller input: numeric text is an id, anything else a key.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Key(value.to_owned()),
        }
    }

    /// Creates a key reference without numeric interpretation.
    #[must_use]
    pub fn key(value: impl Into<String>) -> Self {
        Self::Key(value.into())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityRef {
    Id(i64),
    Text(String),
}

impl From<RawEntityRef> for EntityRef {
    fn from(raw: RawEntityRef) -> Self {
        match raw {
            RawEntityRef::Id(id) => Self::Id(id),
            RawEntityRef::Text(text) => Self::parse(text.as_str()),
        }
    }
}

impl From<i64> for EntityRef {
    fn from(value: i64) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for EntityRef {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for EntityRef {
    fn from(value: String) -> Self {
        Self::parse(value.as_str())
    }
}

impl Display for EntityRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(formatter, "#{id}"),
            Self::Key(key) => write!(formatter, "'{key}'"),
        }
    }
}

/// Uniform reference list ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSet {
    /// Nothing to resolve.
    Empty,
    /// Ids used as-is.
    Ids(Vec<i64>),
    /// Keys resolved through the target kind's key lookup.
    Keys(Vec<String>),
}

impl ReferenceSet {
    /// Classifies a reference list, dropping duplicates in first-seen order.
    ///
    /// Lists mixing ids and keys are rejected.
    pub fn classify(references: &[EntityRef]) -> AppResult<Self> {
        let mut ids = Vec::new();
        let mut keys = Vec::new();

        for reference in references {
            match reference {
                EntityRef::Id(id) if !ids.contains(id) => ids.push(*id),
                EntityRef::Key(key) if !keys.contains(key) => keys.push(key.clone()),
                _ => {}
            }
        }

        match (ids.is_empty(), keys.is_empty()) {
            (true, true) => Ok(Self::Empty),
            (false, true) => Ok(Self::Ids(ids)),
            (true, false) => Ok(Self::Keys(keys)),
            (false, false) => Err(AppError::Validation(format!(
                "reference list mixes ids {ids:?} and keys {keys:?}; pass one form per call"
            ))),
        }
    }
}

/// Ensures every requested key was resolved to an id.
pub fn ensure_keys_resolved(
    kind: &str,
    requested: &[String],
    resolved: &[(i64, String)],
) -> AppResult<Vec<i64>> {
    let missing: Vec<&str> = requested
        .iter()
        .filter(|key| !resolved.iter().any(|(_, resolved_key)| resolved_key == *key))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "{kind} keys not found: {}",
            missing.join(", ")
        )));
    }

    Ok(requested
        .iter()
        .filter_map(|key| {
            resolved
                .iter()
                .find(|(_, resolved_key)| resolved_key == key)
                .map(|(id, _)| *id)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{EntityRef, ReferenceSet, ensure_keys_resolved};

    #[test]
    fn numeric_text_parses_as_id() {
        assert_eq!(EntityRef::parse("12"), EntityRef::Id(12));
        assert_eq!(EntityRef::parse("edit-post"), EntityRef::key("edit-post"));
        assert_eq!(EntityRef::from("3"), EntityRef::Id(3));
    }

    #[test]
    fn quoted_numbers_deserialize_as_ids() {
        let references: Vec<EntityRef> =
            serde_json::from_str(r#"[12, "12", "edit-post"]"#).unwrap_or_default();
        assert_eq!(
            references,
            vec![
                EntityRef::Id(12),
                EntityRef::Id(12),
                EntityRef::key("edit-post")
            ]
        );
    }

    #[test]
    fn classify_keeps_uniform_lists() {
        let ids = ReferenceSet::classify(&[EntityRef::Id(1), EntityRef::Id(2), EntityRef::Id(1)]);
        assert_eq!(ids.ok(), Some(ReferenceSet::Ids(vec![1, 2])));

        let keys = ReferenceSet::classify(&[EntityRef::key("a"), EntityRef::key("b")]);
        assert_eq!(
            keys.ok(),
            Some(ReferenceSet::Keys(vec!["a".to_owned(), "b".to_owned()]))
        );

        assert_eq!(ReferenceSet::classify(&[]).ok(), Some(ReferenceSet::Empty));
    }

    #[test]
    fn classify_rejects_mixed_lists() {
        let mixed = ReferenceSet::classify(&[EntityRef::Id(1), EntityRef::key("editor")]);
        assert!(mixed.is_err());
    }

    #[test]
    fn unresolved_keys_are_reported() {
        let requested = vec!["editor".to_owned(), "viewer".to_owned()];
        let resolved = vec![(4, "editor".to_owned())];

        let result = ensure_keys_resolved("role", &requested, &resolved);
        assert!(result.is_err());

        let requested = vec!["viewer".to_owned(), "editor".to_owned()];
        let resolved = vec![(4, "editor".to_owned()), (9, "viewer".to_owned())];
        let result = ensure_keys_resolved("role", &requested, &resolved);
        assert_eq!(result.unwrap_or_default(), vec![9, 4]);
    }
}
