#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::Notify;

use wallet_connect_core::{
    AccountsFeed, AccountsSubscription, DerivationPath, DeviceBridgePort, DeviceSettings,
    ExtensionProviderPort, HardwareConfig, ManifestConfig, PortError,
};

pub fn hardware_config() -> HardwareConfig {
    HardwareConfig {
        contact: Some("dev@example.org".to_owned()),
        app_url: Some("https://wallet.example.org".to_owned()),
        derivation_paths: DerivationPath::ethereum_accounts(3),
    }
}

pub fn needs_manifest() -> DeviceSettings {
    DeviceSettings::NotInitialized {
        code: "Init_NotInitialized".to_owned(),
        message: "TrezorConnect not yet initialized".to_owned(),
    }
}

fn bump(counter: &Cell<u32>) {
    counter.set(counter.get() + 1);
}

#[derive(Debug, Default)]
pub struct BridgeCalls {
    pub get_settings: Cell<u32>,
    pub initialize: Cell<u32>,
    pub get_addresses: Cell<u32>,
}

impl BridgeCalls {
    pub fn total(&self) -> u32 {
        self.get_settings.get() + self.initialize.get() + self.get_addresses.get()
    }
}

/// Device bridge answering from a script. Settings queries past the end of
/// the script report an initialized bridge.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBridge {
    pub calls: Rc<BridgeCalls>,
    settings: Rc<RefCell<VecDeque<Result<DeviceSettings, PortError>>>>,
    initialize_failure: Rc<RefCell<Option<PortError>>>,
    addresses: Rc<RefCell<Vec<String>>>,
    addresses_failure: Rc<RefCell<Option<PortError>>>,
    seen_paths: Rc<RefCell<Vec<DerivationPath>>>,
    seen_manifest: Rc<RefCell<Option<ManifestConfig>>>,
    gate: Option<Rc<Notify>>,
    init_gate: Option<Rc<Notify>>,
}

impl ScriptedBridge {
    pub fn with_settings(self, script: Vec<Result<DeviceSettings, PortError>>) -> Self {
        self.settings.borrow_mut().extend(script);
        self
    }

    pub fn with_addresses(self, addresses: &[&str]) -> Self {
        *self.addresses.borrow_mut() = addresses.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn failing_initialize(self, err: PortError) -> Self {
        *self.initialize_failure.borrow_mut() = Some(err);
        self
    }

    pub fn failing_addresses(self, err: PortError) -> Self {
        *self.addresses_failure.borrow_mut() = Some(err);
        self
    }

    /// Address retrieval waits for one `notify_one` on the gate.
    pub fn gated(mut self, gate: Rc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// `initialize` waits for one `notify_one` on the gate.
    pub fn gated_initialize(mut self, gate: Rc<Notify>) -> Self {
        self.init_gate = Some(gate);
        self
    }

    pub fn seen_paths(&self) -> Vec<DerivationPath> {
        self.seen_paths.borrow().clone()
    }

    pub fn seen_manifest(&self) -> Option<ManifestConfig> {
        self.seen_manifest.borrow().clone()
    }
}

impl DeviceBridgePort for ScriptedBridge {
    async fn get_settings(&self) -> Result<DeviceSettings, PortError> {
        bump(&self.calls.get_settings);
        self.settings
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(DeviceSettings::Initialized))
    }

    async fn initialize(&self, manifest: &ManifestConfig) -> Result<(), PortError> {
        bump(&self.calls.initialize);
        *self.seen_manifest.borrow_mut() = Some(manifest.clone());
        if let Some(gate) = &self.init_gate {
            gate.notified().await;
        }
        match self.initialize_failure.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_addresses(&self, paths: &[DerivationPath]) -> Result<Vec<String>, PortError> {
        bump(&self.calls.get_addresses);
        *self.seen_paths.borrow_mut() = paths.to_vec();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = self.addresses_failure.borrow().clone() {
            return Err(err);
        }
        Ok(self.addresses.borrow().clone())
    }
}

#[derive(Debug, Default)]
pub struct ProviderCalls {
    pub request_accounts: Cell<u32>,
    pub subscribe: Cell<u32>,
    pub unsubscribe: Cell<u32>,
    pub prompt_installation: Cell<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    pub calls: Rc<ProviderCalls>,
    available: Rc<Cell<bool>>,
    known: Rc<RefCell<Vec<String>>>,
    response: Rc<RefCell<Vec<String>>>,
    failure: Rc<RefCell<Option<PortError>>>,
    feed: AccountsFeed,
    gate: Option<Rc<Notify>>,
}

impl ScriptedProvider {
    pub fn available() -> Self {
        let provider = Self::default();
        provider.set_available(true);
        provider
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn gated(mut self, gate: Rc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    pub fn set_known(&self, accounts: &[&str]) {
        *self.known.borrow_mut() = accounts.iter().map(|a| (*a).to_owned()).collect();
    }

    pub fn respond_with(&self, accounts: &[&str]) {
        *self.response.borrow_mut() = accounts.iter().map(|a| (*a).to_owned()).collect();
        *self.failure.borrow_mut() = None;
    }

    pub fn fail_with(&self, err: PortError) {
        *self.failure.borrow_mut() = Some(err);
    }

    pub fn push_accounts_changed(&self, accounts: &[&str]) {
        self.feed
            .push(accounts.iter().map(|a| (*a).to_owned()).collect())
            .expect("push accounts changed");
    }
}

impl ExtensionProviderPort for ScriptedProvider {
    fn is_available(&self) -> bool {
        self.available.get()
    }

    fn known_accounts(&self) -> Result<Vec<String>, PortError> {
        Ok(self.known.borrow().clone())
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        bump(&self.calls.request_accounts);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = self.failure.borrow().clone() {
            return Err(err);
        }
        Ok(self.response.borrow().clone())
    }

    fn subscribe_accounts_changed(&self) -> Result<AccountsSubscription, PortError> {
        bump(&self.calls.subscribe);
        let calls = Rc::clone(&self.calls);
        Ok(AccountsSubscription::new(self.feed.clone(), move || {
            bump(&calls.unsubscribe)
        }))
    }

    fn prompt_installation(&self) -> Result<(), PortError> {
        bump(&self.calls.prompt_installation);
        Ok(())
    }
}
