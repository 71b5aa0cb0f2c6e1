use tracing::debug;

use crate::domain::Account;
use crate::ports::ConnectorError;

/// Deduplicated accounts in first-seen order. Entries are never removed and
/// the first origin reported for an address is the one kept.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every account whose address is not yet present. The whole
    /// batch is rejected, and the registry left untouched, if any entry has
    /// no address.
    pub fn merge<I>(&mut self, incoming: I) -> Result<&[Account], ConnectorError>
    where
        I: IntoIterator<Item = Account>,
    {
        let incoming: Vec<Account> = incoming.into_iter().collect();
        for account in &incoming {
            account.validate()?;
        }

        let mut added = 0usize;
        let mut duplicates = 0usize;
        for account in incoming {
            if self.contains(&account.address) {
                duplicates += 1;
                continue;
            }
            self.accounts.push(account);
            added += 1;
        }
        debug!(added, duplicates, total = self.accounts.len(), "accounts merged");
        Ok(&self.accounts)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.address == address)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
