use std::cell::{Cell, RefCell};

use tracing::{debug, error, info, warn};

use crate::domain::{Account, ConnectorStatus, ProviderKind};
use crate::ports::{AccountsSubscription, ConnectorError, ExtensionProviderPort};
use crate::state_machine::{
    extension_transition, ExtensionAction, ExtensionState, StateTransition,
};

/// Tracks installation and connection of a browser-extension wallet.
///
/// The accounts-changed subscription is acquired the first time the
/// provider is detected and released on `dispose`, on drop, or when the
/// provider disappears.
#[derive(Debug)]
pub struct ExtensionConnector<P: ExtensionProviderPort> {
    provider: P,
    state: Cell<ExtensionState>,
    disposed: Cell<bool>,
    subscription: RefCell<Option<AccountsSubscription>>,
    history: RefCell<Vec<StateTransition<ExtensionState>>>,
    last_error: RefCell<Option<ConnectorError>>,
}

impl<P: ExtensionProviderPort> ExtensionConnector<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: Cell::new(ExtensionState::Undetermined),
            disposed: Cell::new(false),
            subscription: RefCell::new(None),
            history: RefCell::new(Vec::new()),
            last_error: RefCell::new(None),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> ExtensionState {
        self.state.get()
    }

    pub fn status(&self) -> ConnectorStatus {
        let state = self.state();
        ConnectorStatus {
            kind: ProviderKind::Extension,
            state: state.name(),
            label: state.label(),
            actionable: self.is_live() && state.accepts_connect(),
        }
    }

    pub fn history(&self) -> Vec<StateTransition<ExtensionState>> {
        self.history.borrow().clone()
    }

    pub fn last_error(&self) -> Option<ConnectorError> {
        self.last_error.borrow().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    pub fn is_live(&self) -> bool {
        !self.disposed.get()
    }

    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.release_subscription();
        debug!(connector = "extension", state = self.state().name(), "connector disposed");
    }

    /// Detects the provider and collects accounts it pushed since the last
    /// drive. Pushed accounts never pass through `AccountsRequested`.
    pub fn drive(&self) -> Vec<Account> {
        if !self.is_live() {
            return Vec::new();
        }
        let mut discovered = Vec::new();

        let state = self.state();
        if state != ExtensionState::AccountsRequested {
            if !self.provider.is_available() {
                if state.is_available() {
                    info!(connector = "extension", "provider no longer detected");
                    self.release_subscription();
                }
                self.advance(ExtensionAction::ProviderMissing);
                return discovered;
            }
            if !state.is_available() {
                self.ensure_subscribed();
                match self.provider.known_accounts() {
                    Ok(known) if !known.is_empty() => {
                        info!(connector = "extension", count = known.len(), "provider already connected");
                        self.advance(ExtensionAction::AccountsKnown);
                        discovered.extend(tag(known));
                    }
                    Ok(_) => self.advance(ExtensionAction::ProviderDetected),
                    Err(e) => {
                        warn!(connector = "extension", error = %e, "reading known accounts failed");
                        self.last_error.replace(Some(e.into()));
                        self.advance(ExtensionAction::ProviderDetected);
                    }
                }
            }
        }

        for batch in self.drain_notifications() {
            let requested = self.state() == ExtensionState::AccountsRequested;
            if batch.is_empty() {
                if !requested {
                    self.advance(ExtensionAction::AccountsCleared);
                }
                continue;
            }
            debug!(connector = "extension", count = batch.len(), "accounts changed");
            if !requested {
                self.advance(ExtensionAction::AccountsKnown);
            }
            discovered.extend(tag(batch));
        }
        discovered
    }

    /// Prompts installation when the provider is missing, otherwise asks
    /// the provider for its accounts. A failed request leaves the connector
    /// disconnected and usable.
    pub async fn connect(&self) -> Result<Vec<Account>, ConnectorError> {
        self.ensure_live("connect")?;

        if self.state() == ExtensionState::NotAvailable {
            if let Err(e) = self.provider.prompt_installation() {
                warn!(connector = "extension", error = %e, "installation prompt failed");
                self.last_error.replace(Some(e.into()));
                return Ok(Vec::new());
            }
            self.apply(ExtensionAction::InstallRequested)?;
            return Ok(Vec::new());
        }

        self.apply(ExtensionAction::RequestAccounts)?;
        let _settle = InFlight { connector: self };

        let result = self.provider.request_accounts().await;
        if !self.is_live() {
            debug!(connector = "extension", "ignoring accounts resolved after disposal");
            return Ok(Vec::new());
        }

        match result {
            Ok(accounts) => {
                info!(connector = "extension", count = accounts.len(), "extension accounts retrieved");
                self.advance(ExtensionAction::RequestSucceeded);
                Ok(tag(accounts))
            }
            Err(e) => {
                warn!(connector = "extension", error = %e, "extension accounts request failed");
                self.last_error.replace(Some(e.into()));
                self.advance(ExtensionAction::RequestFailed);
                Ok(Vec::new())
            }
        }
    }

    fn ensure_subscribed(&self) {
        if self.is_subscribed() {
            return;
        }
        match self.provider.subscribe_accounts_changed() {
            Ok(subscription) => {
                debug!(connector = "extension", "subscribed to accounts changes");
                self.subscription.replace(Some(subscription));
            }
            Err(e) => {
                warn!(connector = "extension", error = %e, "accounts subscription failed");
                self.last_error.replace(Some(e.into()));
            }
        }
    }

    fn release_subscription(&self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!(connector = "extension", "unsubscribed from accounts changes");
        }
    }

    fn drain_notifications(&self) -> Vec<Vec<String>> {
        let g = self.subscription.borrow();
        let Some(subscription) = g.as_ref() else {
            return Vec::new();
        };
        match subscription.drain() {
            Ok(batches) => batches,
            Err(e) => {
                warn!(connector = "extension", error = %e, "draining accounts changes failed");
                Vec::new()
            }
        }
    }

    fn ensure_live(&self, action: &'static str) -> Result<(), ConnectorError> {
        if self.is_live() {
            return Ok(());
        }
        Err(ConnectorError::NotReady {
            connector: ProviderKind::Extension,
            state: "disposed",
            action,
        })
    }

    fn apply(&self, action: ExtensionAction) -> Result<ExtensionState, ConnectorError> {
        let (to, record) = extension_transition(self.state(), action)?;
        if record.from != to {
            debug!(
                connector = "extension",
                from = record.from.name(),
                to = to.name(),
                reason = record.reason,
                "state transition"
            );
            self.history.borrow_mut().push(record);
        }
        self.state.set(to);
        Ok(to)
    }

    fn advance(&self, action: ExtensionAction) {
        if let Err(e) = self.apply(action) {
            error!(connector = "extension", error = %e, "transition rejected");
        }
    }
}

fn tag(addresses: Vec<String>) -> Vec<Account> {
    addresses
        .into_iter()
        .map(|address| Account::new(address, ProviderKind::Extension))
        .collect()
}

/// Fails a request whose future was dropped before it resolved.
struct InFlight<'a, P: ExtensionProviderPort> {
    connector: &'a ExtensionConnector<P>,
}

impl<P: ExtensionProviderPort> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        if self.connector.state() == ExtensionState::AccountsRequested {
            self.connector.advance(ExtensionAction::RequestFailed);
        }
    }
}
