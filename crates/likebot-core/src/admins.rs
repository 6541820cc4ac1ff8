//! Admin allow-list — a static set of privileged principal ids loaded
//! at startup. O(1) membership, never mutated at runtime.

use crate::types::PrincipalId;
use std::collections::HashSet;

/// Privileged principals. Admins may grant capabilities, set limits,
/// trigger manual runs, and remove any auto task.
#[derive(Debug, Clone, Default)]
pub struct AdminSet {
    ids: HashSet<PrincipalId>,
}

impl AdminSet {
    pub fn from_ids(ids: &[i64]) -> Self {
        Self {
            ids: ids.iter().map(|id| PrincipalId(*id)).collect(),
        }
    }

    pub fn contains(&self, principal: PrincipalId) -> bool {
        self.ids.contains(&principal)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
