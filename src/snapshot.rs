//! Last-known-good dashboard state.
//!
//! Only the engine task writes; everyone else gets a cloned [`Snapshot`].
//! A field is replaced only by a successful decode, so a failing backend
//! leaves the previous value on screen.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::types::{Account, ActivityState, BusyProbability};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub activity: Option<ActivityState>,
    pub probability: Option<BusyProbability>,
    /// Server order.
    pub accounts: Vec<Account>,
    /// Bumped on every write; lets renderers skip unchanged frames.
    pub revision: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct SnapshotStore {
    inner: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().clone()
    }

    pub(crate) fn set_activity(&self, activity: ActivityState) {
        self.write(|s| s.activity = Some(activity));
    }

    pub(crate) fn set_probability(&self, probability: BusyProbability) {
        self.write(|s| s.probability = Some(probability));
    }

    pub(crate) fn set_accounts(&self, accounts: Vec<Account>) {
        self.write(|s| s.accounts = accounts);
    }

    fn write(&self, f: impl FnOnce(&mut Snapshot)) {
        let mut guard = self.inner.write();
        f(&mut guard);
        guard.revision += 1;
        guard.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64) -> Account {
        Account {
            id,
            name: format!("Customer {}", id),
            email: format!("c{}@example.com", id),
            recently_ordered: false,
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = SnapshotStore::new();
        let snapshot = store.snapshot();

        assert!(snapshot.activity.is_none());
        assert!(snapshot.probability.is_none());
        assert!(snapshot.accounts.is_empty());
        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.updated_at.is_none());
    }

    #[test]
    fn test_accounts_replaced_wholesale() {
        let store = SnapshotStore::new();
        store.set_accounts(vec![account(1), account(2)]);
        store.set_accounts(vec![account(3)]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.accounts, vec![account(3)]);
        assert_eq!(snapshot.revision, 2);
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = SnapshotStore::new();
        store.set_accounts(vec![account(1)]);
        let before = store.snapshot();

        store.set_accounts(Vec::new());

        assert_eq!(before.accounts.len(), 1);
        assert!(store.snapshot().accounts.is_empty());
    }
}
