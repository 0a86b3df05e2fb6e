//! New-account detection over successive accounts fetches.
//!
//! The known-ID set only grows: an account that disappears and comes back
//! is not announced twice, and edits to a known account are not news.

use std::collections::HashSet;

use crate::types::Account;

#[derive(Debug, Default)]
pub struct ChangeDetector {
    known: HashSet<i64>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `accounts` and return those whose id was never seen, in list order.
    pub fn observe(&mut self, accounts: &[Account]) -> Vec<Account> {
        accounts
            .iter()
            .filter(|account| self.known.insert(account.id))
            .cloned()
            .collect()
    }

    /// Record `accounts` without reporting anything.
    pub fn seed(&mut self, accounts: &[Account]) {
        self.known.extend(accounts.iter().map(|a| a.id));
    }

    pub fn known_ids(&self) -> &HashSet<i64> {
        &self.known
    }
}
