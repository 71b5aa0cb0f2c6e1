use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::domain::{DerivationPath, DeviceSettings, ManifestConfig, ProviderKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("bridge call timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("{connector} connector not ready: cannot {action} while {state}")]
    NotReady {
        connector: ProviderKind,
        state: &'static str,
        action: &'static str,
    },
    #[error("invalid account: {0}")]
    InvalidAccount(String),
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error("bridge failure: {0}")]
    Bridge(#[from] PortError),
    #[error("unhandled device bridge code: {0}")]
    UnhandledBridgeCode(String),
}

/// Asynchronous bridge to a hardware wallet (Trezor Connect and similar).
#[allow(async_fn_in_trait)]
pub trait DeviceBridgePort {
    async fn get_settings(&self) -> Result<DeviceSettings, PortError>;
    async fn initialize(&self, manifest: &ManifestConfig) -> Result<(), PortError>;
    async fn get_addresses(&self, paths: &[DerivationPath]) -> Result<Vec<String>, PortError>;
}

/// Browser-extension wallet reachable through an EIP-1193 provider.
#[allow(async_fn_in_trait)]
pub trait ExtensionProviderPort {
    fn is_available(&self) -> bool;
    /// Accounts the provider already exposes without prompting the user.
    fn known_accounts(&self) -> Result<Vec<String>, PortError>;
    async fn request_accounts(&self) -> Result<Vec<String>, PortError>;
    fn subscribe_accounts_changed(&self) -> Result<AccountsSubscription, PortError>;
    fn prompt_installation(&self) -> Result<(), PortError>;
}

/// Producer side of an "accounts changed" stream. Adapters push every
/// notification here; the subscription drains them on the next drive.
#[derive(Debug, Clone, Default)]
pub struct AccountsFeed {
    inner: Arc<Mutex<VecDeque<Vec<String>>>>,
}

impl AccountsFeed {
    pub fn push(&self, accounts: Vec<String>) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("accounts feed lock poisoned: {e}")))?;
        g.push_back(accounts);
        Ok(())
    }

    fn drain(&self) -> Result<Vec<Vec<String>>, PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Transport(format!("accounts feed lock poisoned: {e}")))?;
        Ok(g.drain(..).collect())
    }
}

/// Scoped registration on an "accounts changed" stream. The release action
/// runs exactly once, on `unsubscribe` or on drop.
pub struct AccountsSubscription {
    feed: AccountsFeed,
    release: Option<Box<dyn FnOnce()>>,
}

impl AccountsSubscription {
    pub fn new(feed: AccountsFeed, release: impl FnOnce() + 'static) -> Self {
        Self {
            feed,
            release: Some(Box::new(release)),
        }
    }

    pub fn drain(&self) -> Result<Vec<Vec<String>>, PortError> {
        self.feed.drain()
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for AccountsSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for AccountsSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountsSubscription")
            .field("feed", &self.feed)
            .field("released", &self.release.is_none())
            .finish()
    }
}
