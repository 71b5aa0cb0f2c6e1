use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::domain::{Account, ConnectorStatus, HardwareConfig, ProviderKind};
use crate::extension::ExtensionConnector;
use crate::hardware::HardwareConnector;
use crate::ports::{ConnectorError, DeviceBridgePort, ExtensionProviderPort};
use crate::registry::AccountRegistry;

pub type SelectionListener = Rc<dyn Fn(&Account)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectCommand {
    Connect(ProviderKind),
    Retry(ProviderKind),
}

/// Composes both connectors with the account registry. Holds no
/// wallet-specific logic: connector output is routed into `merge`, and the
/// merged list plus a selection notification are exposed to the UI.
///
/// The orchestrator is `!Sync`; merges are serialized by construction.
pub struct ConnectionOrchestrator<D, E>
where
    D: DeviceBridgePort,
    E: ExtensionProviderPort,
{
    pub hardware: HardwareConnector<D>,
    pub extension: ExtensionConnector<E>,
    registry: RefCell<AccountRegistry>,
    selected: RefCell<Option<Account>>,
    listeners: RefCell<Vec<SelectionListener>>,
}

impl<D, E> ConnectionOrchestrator<D, E>
where
    D: DeviceBridgePort,
    E: ExtensionProviderPort,
{
    pub fn new(
        device_bridge: D,
        extension_provider: E,
        hardware_config: &HardwareConfig,
    ) -> Result<Self, ConnectorError> {
        Ok(Self {
            hardware: HardwareConnector::new(device_bridge, hardware_config)?,
            extension: ExtensionConnector::new(extension_provider),
            registry: RefCell::new(AccountRegistry::new()),
            selected: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// One scheduling tick: detects the extension, absorbs pushed accounts
    /// and advances hardware initialization.
    pub async fn drive(&self) -> Vec<Account> {
        let pushed = self.extension.drive();
        self.absorb(pushed);
        self.hardware.drive().await;
        self.accounts()
    }

    /// Only `NotReady` reaches the caller; bridge failures end up in the
    /// connector state and the log.
    pub async fn connect(&self, kind: ProviderKind) -> Result<Vec<Account>, ConnectorError> {
        let retrieved = match kind {
            ProviderKind::Hardware => self.hardware.connect().await?,
            ProviderKind::Extension => self.extension.connect().await?,
        };
        self.absorb(retrieved);
        Ok(self.accounts())
    }

    pub async fn handle(&self, command: ConnectCommand) -> Result<Vec<Account>, ConnectorError> {
        match command {
            ConnectCommand::Connect(kind) => self.connect(kind).await,
            ConnectCommand::Retry(ProviderKind::Hardware) => {
                self.hardware.retry()?;
                Ok(self.drive().await)
            }
            ConnectCommand::Retry(ProviderKind::Extension) => Ok(self.drive().await),
        }
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.registry.borrow().snapshot()
    }

    pub fn status(&self, kind: ProviderKind) -> ConnectorStatus {
        match kind {
            ProviderKind::Hardware => self.hardware.status(),
            ProviderKind::Extension => self.extension.status(),
        }
    }

    pub fn statuses(&self) -> [ConnectorStatus; 2] {
        [self.hardware.status(), self.extension.status()]
    }

    pub fn on_account_selected(&self, listener: impl Fn(&Account) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn select_account(&self, address: &str) -> Result<Account, ConnectorError> {
        let account = self
            .registry
            .borrow()
            .get(address)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownAccount(address.to_owned()))?;
        info!(address = %account.address, origin = %account.origin, "account selected");
        self.selected.replace(Some(account.clone()));
        // Listeners may register further listeners while they run.
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener(&account);
        }
        Ok(account)
    }

    pub fn selected_account(&self) -> Option<Account> {
        self.selected.borrow().clone()
    }

    pub fn is_live(&self) -> bool {
        self.hardware.is_live() && self.extension.is_live()
    }

    pub fn dispose(&self) {
        self.extension.dispose();
        self.hardware.dispose();
    }

    fn absorb(&self, retrieved: Vec<Account>) {
        if retrieved.is_empty() {
            return;
        }
        if !self.is_live() {
            debug!(count = retrieved.len(), "dropping accounts retrieved after disposal");
            return;
        }
        let mut registry = self.registry.borrow_mut();
        if let Err(e) = registry.merge(retrieved) {
            warn!(error = %e, "rejected account batch");
        }
    }
}

impl<D, E> Drop for ConnectionOrchestrator<D, E>
where
    D: DeviceBridgePort,
    E: ExtensionProviderPort,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<D, E> fmt::Debug for ConnectionOrchestrator<D, E>
where
    D: DeviceBridgePort,
    E: ExtensionProviderPort,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOrchestrator")
            .field("hardware", &self.hardware.status())
            .field("extension", &self.extension.status())
            .field("accounts", &self.registry.borrow().len())
            .field("selected", &self.selected.borrow())
            .finish()
    }
}
