use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Subject type prefix reserved for links stored between access-control records.
pub const RESERVED_SUBJECT_PREFIX: &str = "rolegate:";

/// Polymorphic reference to any entity that can hold roles, permissions or groups.
///
/// The core never inspects concrete subject schemas; a subject is only the
/// pair of its type tag and its numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectRef {
    subject_type: String,
    subject_id: i64,
}

impl SubjectRef {
    /// Creates a reference to an application subject such as a user.
    ///
    /// Types starting with [`RESERVED_SUBJECT_PREFIX`] are rejected.
    pub fn new(subject_type: impl Into<String>, subject_id: i64) -> AppResult<Self> {
        let subject_type = subject_type.into();
        if subject_type.trim().is_empty() {
            return Err(AppError::Validation(
                "subject type must not be empty or whitespace".to_owned(),
            ));
        }

        if subject_type.starts_with(RESERVED_SUBJECT_PREFIX) {
            return Err(AppError::Validation(format!(
                "subject type '{subject_type}' uses the reserved prefix '{RESERVED_SUBJECT_PREFIX}'"
            )));
        }

        Ok(Self {
            subject_type,
            subject_id,
        })
    }

    /// Creates a reference under a reserved internal type.
    #[must_use]
    pub fn internal(kind: &str, subject_id: i64) -> Self {
        Self {
            subject_type: Self::internal_type(kind),
            subject_id,
        }
    }

    /// Returns the reserved subject type tag for an internal kind.
    #[must_use]
    pub fn internal_type(kind: &str) -> String {
        format!("{RESERVED_SUBJECT_PREFIX}{kind}")
    }

    /// Restores a reference read back from storage without re-validating it.
    #[must_use]
    pub fn from_storage(subject_type: String, subject_id: i64) -> Self {
        Self {
            subject_type,
            subject_id,
        }
    }

    /// Returns the subject type tag.
    #[must_use]
    pub fn subject_type(&self) -> &str {
        self.subject_type.as_str()
    }

    /// Returns the subject id.
    #[must_use]
    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    /// Returns whether this reference points at an internal access-control record.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.subject_type.starts_with(RESERVED_SUBJECT_PREFIX)
    }
}

impl Display for SubjectRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.subject_type, self.subject_id)
    }
}
