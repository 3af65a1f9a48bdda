use std::collections::BTreeSet;

use rolegate_core::{AppError, AppResult, SubjectRef};

use crate::{PermissionRepository, SubjectAccessService};

/// Boolean access gates, one per stored permission key.
#[derive(Clone)]
pub struct PermissionGates {
    keys: BTreeSet<String>,
    access: SubjectAccessService,
}

impl PermissionGates {
    /// Defines a gate for every permission currently stored.
    ///
    /// Call after the schema is installed; storage errors are returned.
    pub async fn register(
        permissions: &dyn PermissionRepository,
        access: SubjectAccessService,
    ) -> AppResult<Self> {
        let keys = permissions.list_permission_keys().await?;
        Ok(Self {
            keys: keys.into_iter().collect(),
            access,
        })
    }

    /// Returns whether a gate exists for `key`.
    #[must_use]
    pub fn is_defined(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Iterates the defined gate names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Returns the number of defined gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns whether no gate is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluates a gate. Guests and undefined gates are denied.
    pub async fn allows(&self, subject: Option<&SubjectRef>, key: &str) -> AppResult<bool> {
        let Some(subject) = subject else {
            return Ok(false);
        };

        if !self.is_defined(key) {
            return Ok(false);
        }

        self.access.has_permission_to(subject, key).await
    }

    /// Evaluates a gate and fails with [`AppError::Forbidden`] when denied.
    pub async fn authorize(&self, subject: Option<&SubjectRef>, key: &str) -> AppResult<()> {
        if self.allows(subject, key).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(match subject {
            Some(subject) => format!("subject '{subject}' is missing permission '{key}'"),
            None => format!("guests cannot pass gate '{key}'"),
        }))
    }
}
