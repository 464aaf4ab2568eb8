//! Role-to-account directory with on-demand sync.

use crate::config::UserConfig;
use crate::error::{HarnessError, Result};
use crate::ledger::NetworkProvider;
use crate::types::Account;
use tracing::{debug, info};

/// Accounts known to the session, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    /// Registers one unsynced account per configured user.
    pub fn from_config(users: &[UserConfig]) -> Self {
        Self {
            accounts: users
                .iter()
                .map(|user| Account::new(user.role.clone(), user.identity()))
                .collect(),
        }
    }

    /// Account registered under `role`.
    pub fn get_user(&self, role: &str) -> Result<&Account> {
        self.accounts
            .iter()
            .find(|a| a.role == role)
            .ok_or_else(|| HarnessError::UnknownRole(role.to_string()))
    }

    /// All accounts in declaration order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// True if no role is registered.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Refreshes exactly `roles` from the provider and applies the result.
    ///
    /// Returns the refreshed accounts. On error the directory is untouched.
    ///
    /// # Errors
    ///
    /// See [`AccountDirectory::fetch`].
    pub async fn sync<P>(&mut self, roles: &[&str], provider: &P) -> Result<Vec<Account>>
    where
        P: NetworkProvider + ?Sized,
    {
        let updated = self.fetch(roles, provider).await?;
        self.apply(updated.clone());
        Ok(updated)
    }

    /// Fetches fresh state for `roles` without changing the directory.
    ///
    /// Every role is validated before the first network call. Repeated roles
    /// are fetched once.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` before any network call if a role is not
    /// registered, and `NetworkUnreachable` if a fetch fails.
    pub async fn fetch<P>(&self, roles: &[&str], provider: &P) -> Result<Vec<Account>>
    where
        P: NetworkProvider + ?Sized,
    {
        let mut targets: Vec<&Account> = Vec::with_capacity(roles.len());
        for role in roles {
            let account = self.get_user(role)?;
            if !targets.iter().any(|t| t.role == account.role) {
                targets.push(account);
            }
        }

        let mut fetched = Vec::with_capacity(targets.len());
        for account in targets {
            let state = provider
                .get_account(&account.identity)
                .await
                .map_err(|e| {
                    HarnessError::NetworkUnreachable(format!("{}: {}", account.role, e))
                })?;
            debug!(role = %account.role, nonce = state.nonce, "Fetched account state");
            let mut refreshed = account.clone();
            refreshed.state = state;
            refreshed.synced = true;
            fetched.push(refreshed);
        }
        Ok(fetched)
    }

    /// Replaces the cached state of each role in `updated`.
    pub fn apply(&mut self, updated: Vec<Account>) {
        let count = updated.len();
        for record in updated {
            if let Some(account) = self.accounts.iter_mut().find(|a| a.role == record.role) {
                *account = record;
            }
        }
        info!(count, "Synced accounts");
    }

    /// Re-applies persisted state for roles that are still registered with
    /// the same address. Returns how many accounts were restored.
    pub fn restore(&mut self, records: Vec<Account>) -> usize {
        let mut restored = 0;
        for record in records {
            match self.accounts.iter_mut().find(|a| a.role == record.role) {
                Some(account) if account.identity.address == record.identity.address => {
                    account.state = record.state;
                    account.synced = record.synced;
                    restored += 1;
                }
                Some(_) => {
                    debug!(role = %record.role, "Address changed since last run, not restoring");
                }
                None => {
                    debug!(role = %record.role, "Role no longer configured, not restoring");
                }
            }
        }
        restored
    }

    /// Clone of every account, for persistence or reporting.
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.clone()
    }
}
