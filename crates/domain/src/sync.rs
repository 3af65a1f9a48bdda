/// Difference between a stored link set and a target link set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Ids to link.
    pub attach: Vec<i64>,
    /// Ids to unlink.
    pub detach: Vec<i64>,
}

impl SyncPlan {
    /// Plans a set-sync: the result links exactly `target`.
    #[must_use]
    pub fn between(current: &[i64], target: &[i64]) -> Self {
        let mut plan = Self::attach_missing(current, target);
        plan.detach = current
            .iter()
            .filter(|id| !target.contains(id))
            .copied()
            .collect();
        plan
    }

    /// Plans an additive sync that never unlinks.
    #[must_use]
    pub fn attach_missing(current: &[i64], requested: &[i64]) -> Self {
        let mut attach = Vec::new();
        for id in requested {
            if !current.contains(id) && !attach.contains(id) {
                attach.push(*id);
            }
        }

        Self {
            attach,
            detach: Vec::new(),
        }
    }

    /// Returns whether applying the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.attach.is_empty() && self.detach.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SyncPlan;

    #[test]
    fn set_sync_adds_missing_and_removes_extra() {
        let plan = SyncPlan::between(&[1, 2, 3], &[2, 3, 4]);
        assert_eq!(plan.attach, vec![4]);
        assert_eq!(plan.detach, vec![1]);
    }

    #[test]
    fn set_sync_with_same_set_is_noop() {
        assert!(SyncPlan::between(&[5, 6], &[6, 5]).is_noop());
    }

    #[test]
    fn additive_sync_never_detaches() {
        let plan = SyncPlan::attach_missing(&[1], &[1, 2, 2]);
        assert_eq!(plan.attach, vec![2]);
        assert!(plan.detach.is_empty());
    }

    #[test]
    fn empty_target_clears_everything() {
        let plan = SyncPlan::between(&[7, 8], &[]);
        assert!(plan.attach.is_empty());
        assert_eq!(plan.detach, vec![7, 8]);
    }
}
