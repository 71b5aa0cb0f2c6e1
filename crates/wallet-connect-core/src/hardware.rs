use std::cell::{Cell, RefCell};

use tracing::{debug, error, info, warn};

use crate::domain::{
    Account, ConnectorStatus, DerivationPath, DeviceErrorCode, DeviceSettings, HardwareConfig,
    ManifestConfig, ProviderKind,
};
use crate::ports::{ConnectorError, DeviceBridgePort, PortError};
use crate::state_machine::{hardware_transition, HardwareAction, HardwareState, StateTransition};

/// Drives a hardware wallet through initialization and account retrieval.
///
/// Every method takes `&self`: bridge calls are awaited while the connector
/// stays reachable from the orchestrator, and the state guards reject
/// commands that would conflict with a call still in flight.
#[derive(Debug)]
pub struct HardwareConnector<B: DeviceBridgePort> {
    bridge: B,
    manifest: ManifestConfig,
    derivation_paths: Vec<DerivationPath>,
    state: Cell<HardwareState>,
    polling: Cell<bool>,
    disposed: Cell<bool>,
    history: RefCell<Vec<StateTransition<HardwareState>>>,
    last_error: RefCell<Option<ConnectorError>>,
}

impl<B: DeviceBridgePort> HardwareConnector<B> {
    /// Fails with `MissingConfiguration` before the bridge is touched.
    pub fn new(bridge: B, config: &HardwareConfig) -> Result<Self, ConnectorError> {
        let manifest = config.manifest()?;
        if config.derivation_paths.is_empty() {
            return Err(ConnectorError::MissingConfiguration("derivation paths"));
        }
        Ok(Self {
            bridge,
            manifest,
            derivation_paths: config.derivation_paths.clone(),
            state: Cell::new(HardwareState::Undetermined),
            polling: Cell::new(false),
            disposed: Cell::new(false),
            history: RefCell::new(Vec::new()),
            last_error: RefCell::new(None),
        })
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn state(&self) -> HardwareState {
        self.state.get()
    }

    pub fn status(&self) -> ConnectorStatus {
        let state = self.state();
        ConnectorStatus {
            kind: ProviderKind::Hardware,
            state: state.name(),
            label: state.label(),
            actionable: self.is_live() && state.accepts_connect(),
        }
    }

    pub fn derivation_paths(&self) -> &[DerivationPath] {
        &self.derivation_paths
    }

    pub fn history(&self) -> Vec<StateTransition<HardwareState>> {
        self.history.borrow().clone()
    }

    pub fn last_error(&self) -> Option<ConnectorError> {
        self.last_error.borrow().clone()
    }

    pub fn is_live(&self) -> bool {
        !self.disposed.get()
    }

    pub fn dispose(&self) {
        if !self.disposed.replace(true) {
            debug!(connector = "hardware", state = self.state().name(), "connector disposed");
        }
    }

    /// Polls the bridge while the connector is still in a pre-init state.
    /// Initialized and failed connectors are left alone.
    pub async fn drive(&self) -> HardwareState {
        if self.is_live() && self.state().is_pre_init() && !self.polling.get() {
            self.polling.set(true);
            let _polling = PollingGuard(&self.polling);
            self.refresh_settings().await;
        }
        self.state()
    }

    /// Moves a failed connector back to a pre-init state so the next drive
    /// tries to initialize again.
    pub fn retry(&self) -> Result<HardwareState, ConnectorError> {
        self.ensure_live("retry initialization")?;
        let state = self.apply(HardwareAction::Retry)?;
        self.last_error.replace(None);
        Ok(state)
    }

    /// Retrieves the configured derivation paths. Only accepted while
    /// `InitializedIdle`; retrieval failures are logged and yield no
    /// accounts.
    pub async fn connect(&self) -> Result<Vec<Account>, ConnectorError> {
        self.ensure_live("request accounts")?;
        self.apply(HardwareAction::RequestAccounts)?;
        let _settle = InFlight {
            connector: self,
            pending: HardwareState::AccountsRequested,
            on_abort: HardwareAction::AccountsSettled,
        };

        let result = self.bridge.get_addresses(&self.derivation_paths).await;
        if !self.is_live() {
            debug!(connector = "hardware", "ignoring addresses resolved after disposal");
            return Ok(Vec::new());
        }

        match result {
            Ok(addresses) => {
                info!(
                    connector = "hardware",
                    count = addresses.len(),
                    "hardware accounts retrieved"
                );
                Ok(addresses
                    .into_iter()
                    .map(|address| Account::new(address, ProviderKind::Hardware))
                    .collect())
            }
            Err(e) => {
                warn!(connector = "hardware", error = %e, "hardware accounts request failed");
                self.last_error.replace(Some(e.into()));
                Ok(Vec::new())
            }
        }
    }

    async fn refresh_settings(&self) {
        let mut _initializing = None;
        loop {
            let settings = self.bridge.get_settings().await;
            if !self.is_live() {
                debug!(connector = "hardware", "ignoring settings resolved after disposal");
                return;
            }

            let (code, message) = match settings {
                Ok(DeviceSettings::Initialized) => {
                    info!(connector = "hardware", "device bridge initialized");
                    self.advance(HardwareAction::SettingsInitialized);
                    return;
                }
                Ok(DeviceSettings::NotInitialized { code, message }) => (code, message),
                Err(e) => {
                    error!(connector = "hardware", error = %e, "device bridge settings query failed");
                    self.last_error.replace(Some(e.into()));
                    self.advance(HardwareAction::SettingsRejected);
                    return;
                }
            };
            debug!(connector = "hardware", %code, %message, "device bridge not initialized");

            let state = self.state();
            match (DeviceErrorCode::classify(&code), state) {
                (DeviceErrorCode::NeedsManifest, HardwareState::InitializationRequested) => {
                    error!(
                        connector = "hardware",
                        %code,
                        "device bridge should have been initialized, are third party cookies allowed?"
                    );
                    self.last_error.replace(Some(ConnectorError::Bridge(PortError::Policy(
                        "initialize had no effect".to_owned(),
                    ))));
                    self.advance(HardwareAction::SettingsNeedInitialization);
                    return;
                }
                (DeviceErrorCode::NeedsManifest, s) if s.is_pre_init() => {
                    self.advance(HardwareAction::SettingsNeedInitialization);
                    _initializing = Some(InFlight {
                        connector: self,
                        pending: HardwareState::InitializationRequested,
                        on_abort: HardwareAction::Interrupted,
                    });
                    if let Err(e) = self.bridge.initialize(&self.manifest).await {
                        if !self.is_live() {
                            return;
                        }
                        error!(connector = "hardware", error = %e, "device bridge initialize failed");
                        self.last_error.replace(Some(e.into()));
                        self.advance(HardwareAction::InitializeRejected);
                        return;
                    }
                    if !self.is_live() {
                        return;
                    }
                    info!(connector = "hardware", "device bridge initialization requested");
                }
                (DeviceErrorCode::NeedsManifest, s) => {
                    error!(connector = "hardware", state = s.name(), "unexpected state for settings report");
                    self.advance(HardwareAction::SettingsNeedInitialization);
                    return;
                }
                (DeviceErrorCode::Unhandled(code), HardwareState::InitializationRequested) => {
                    error!(
                        connector = "hardware",
                        error = %ConnectorError::UnhandledBridgeCode(code.clone()),
                        "initialization did not complete"
                    );
                    self.last_error.replace(Some(ConnectorError::UnhandledBridgeCode(code)));
                    self.advance(HardwareAction::SettingsRejected);
                    return;
                }
                (DeviceErrorCode::Unhandled(code), s) => {
                    error!(
                        connector = "hardware",
                        state = s.name(),
                        error = %ConnectorError::UnhandledBridgeCode(code.clone()),
                        "device bridge code not implemented"
                    );
                    self.last_error.replace(Some(ConnectorError::UnhandledBridgeCode(code)));
                    return;
                }
            }
        }
    }

    fn ensure_live(&self, action: &'static str) -> Result<(), ConnectorError> {
        if self.is_live() {
            return Ok(());
        }
        Err(ConnectorError::NotReady {
            connector: ProviderKind::Hardware,
            state: "disposed",
            action,
        })
    }

    fn apply(&self, action: HardwareAction) -> Result<HardwareState, ConnectorError> {
        let (to, record) = hardware_transition(self.state(), action)?;
        debug!(
            connector = "hardware",
            from = record.from.name(),
            to = to.name(),
            reason = record.reason,
            "state transition"
        );
        self.state.set(to);
        self.history.borrow_mut().push(record);
        Ok(to)
    }

    // Transitions driven by bridge resolutions are legal by construction;
    // a rejection here means the table and the driver disagree.
    fn advance(&self, action: HardwareAction) {
        if let Err(e) = self.apply(action) {
            error!(connector = "hardware", error = %e, "transition rejected");
        }
    }
}

/// Restores a stable state if the call that entered `pending` never
/// settles (the future was dropped or resolved without a transition).
struct InFlight<'a, B: DeviceBridgePort> {
    connector: &'a HardwareConnector<B>,
    pending: HardwareState,
    on_abort: HardwareAction,
}

impl<B: DeviceBridgePort> Drop for InFlight<'_, B> {
    fn drop(&mut self) {
        if self.connector.state() == self.pending {
            self.connector.advance(self.on_abort);
        }
    }
}

struct PollingGuard<'a>(&'a Cell<bool>);

impl Drop for PollingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
