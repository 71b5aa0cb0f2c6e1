pub mod domain;
pub mod extension;
pub mod hardware;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod state_machine;

pub use domain::{
    Account, ConnectorStatus, DerivationPath, DeviceErrorCode, DeviceSettings, HardwareConfig,
    ManifestConfig, ProviderKind,
};
pub use extension::ExtensionConnector;
pub use hardware::HardwareConnector;
pub use orchestrator::{ConnectCommand, ConnectionOrchestrator, SelectionListener};
pub use ports::{
    AccountsFeed, AccountsSubscription, ConnectorError, DeviceBridgePort, ExtensionProviderPort,
    PortError,
};
pub use registry::AccountRegistry;
pub use state_machine::{
    extension_transition, hardware_transition, ExtensionAction, ExtensionState, HardwareAction,
    HardwareState, StateTransition,
};
