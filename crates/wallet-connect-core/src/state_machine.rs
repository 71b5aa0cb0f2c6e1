use serde::Serialize;

use crate::domain::ProviderKind;
use crate::ports::ConnectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareState {
    Undetermined,
    NotInitialized,
    InitializationRequested,
    InitializedIdle,
    InitializationFailed,
    AccountsRequested,
}

impl HardwareState {
    pub fn name(self) -> &'static str {
        match self {
            HardwareState::Undetermined => "undetermined",
            HardwareState::NotInitialized => "not_initialized",
            HardwareState::InitializationRequested => "initialization_requested",
            HardwareState::InitializedIdle => "initialized_idle",
            HardwareState::InitializationFailed => "initialization_failed",
            HardwareState::AccountsRequested => "accounts_requested",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HardwareState::Undetermined
            | HardwareState::NotInitialized
            | HardwareState::InitializationRequested => "Initializing...",
            HardwareState::InitializedIdle => "Ready",
            HardwareState::AccountsRequested => "Retrieving Accounts...",
            HardwareState::InitializationFailed => "Trezor Unavailable",
        }
    }

    /// States in which the device bridge is still polled for its settings.
    pub fn is_pre_init(self) -> bool {
        matches!(
            self,
            HardwareState::Undetermined | HardwareState::NotInitialized
        )
    }

    pub fn accepts_connect(self) -> bool {
        self == HardwareState::InitializedIdle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareAction {
    SettingsInitialized,
    SettingsNeedInitialization,
    SettingsRejected,
    InitializeRejected,
    Interrupted,
    Retry,
    RequestAccounts,
    AccountsSettled,
}

impl HardwareAction {
    fn name(self) -> &'static str {
        match self {
            HardwareAction::SettingsInitialized => "confirm initialization",
            HardwareAction::SettingsNeedInitialization => "request initialization",
            HardwareAction::SettingsRejected => "handle settings failure",
            HardwareAction::InitializeRejected => "handle initialize failure",
            HardwareAction::Interrupted => "abandon initialization",
            HardwareAction::Retry => "retry initialization",
            HardwareAction::RequestAccounts => "request accounts",
            HardwareAction::AccountsSettled => "settle accounts request",
        }
    }
}

pub fn hardware_transition(
    from: HardwareState,
    action: HardwareAction,
) -> Result<(HardwareState, StateTransition<HardwareState>), ConnectorError> {
    use HardwareAction as A;
    use HardwareState as S;

    let (to, reason) = match (from, action) {
        (S::Undetermined | S::NotInitialized | S::InitializationRequested, A::SettingsInitialized) => {
            (S::InitializedIdle, "device bridge initialized")
        }
        (S::Undetermined | S::NotInitialized, A::SettingsNeedInitialization) => {
            (S::InitializationRequested, "initialize requested")
        }
        (S::InitializationRequested, A::SettingsNeedInitialization) => {
            (S::InitializationFailed, "initialize had no effect")
        }
        (S::InitializedIdle | S::AccountsRequested, A::SettingsNeedInitialization) => {
            (S::InitializationFailed, "initialization lost in unexpected state")
        }
        (
            S::Undetermined | S::NotInitialized | S::InitializationRequested,
            A::SettingsRejected,
        ) => (S::InitializationFailed, "settings query rejected"),
        (S::InitializationRequested, A::InitializeRejected) => {
            (S::InitializationFailed, "initialize rejected")
        }
        (S::InitializationRequested, A::Interrupted) => {
            (S::NotInitialized, "initialization interrupted")
        }
        (S::InitializationFailed, A::Retry) => (S::NotInitialized, "retry requested"),
        (S::InitializedIdle, A::RequestAccounts) => (S::AccountsRequested, "accounts requested"),
        (S::AccountsRequested, A::AccountsSettled) => (S::InitializedIdle, "accounts settled"),
        _ => {
            return Err(ConnectorError::NotReady {
                connector: ProviderKind::Hardware,
                state: from.name(),
                action: action.name(),
            })
        }
    };
    Ok((to, StateTransition { from, to, reason }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionState {
    Undetermined,
    NotAvailable,
    Installing,
    AvailableDisconnected,
    AvailableConnected,
    AccountsRequested,
}

impl ExtensionState {
    pub fn name(self) -> &'static str {
        match self {
            ExtensionState::Undetermined => "undetermined",
            ExtensionState::NotAvailable => "not_available",
            ExtensionState::Installing => "installing",
            ExtensionState::AvailableDisconnected => "available_disconnected",
            ExtensionState::AvailableConnected => "available_connected",
            ExtensionState::AccountsRequested => "accounts_requested",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExtensionState::Undetermined => "Detecting...",
            ExtensionState::NotAvailable => "Install MetaMask",
            ExtensionState::Installing => "Waiting for installation...",
            ExtensionState::AvailableDisconnected => "Connect",
            ExtensionState::AvailableConnected => "Connected",
            ExtensionState::AccountsRequested => "Retrieving Accounts...",
        }
    }

    pub fn is_available(self) -> bool {
        matches!(
            self,
            ExtensionState::AvailableDisconnected
                | ExtensionState::AvailableConnected
                | ExtensionState::AccountsRequested
        )
    }

    pub fn accepts_connect(self) -> bool {
        matches!(
            self,
            ExtensionState::NotAvailable
                | ExtensionState::AvailableDisconnected
                | ExtensionState::AvailableConnected
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionAction {
    ProviderMissing,
    ProviderDetected,
    AccountsKnown,
    AccountsCleared,
    InstallRequested,
    RequestAccounts,
    RequestSucceeded,
    RequestFailed,
}

impl ExtensionAction {
    fn name(self) -> &'static str {
        match self {
            ExtensionAction::ProviderMissing => "mark provider missing",
            ExtensionAction::ProviderDetected => "mark provider detected",
            ExtensionAction::AccountsKnown => "accept pushed accounts",
            ExtensionAction::AccountsCleared => "clear pushed accounts",
            ExtensionAction::InstallRequested => "prompt installation",
            ExtensionAction::RequestAccounts => "request accounts",
            ExtensionAction::RequestSucceeded => "resolve accounts request",
            ExtensionAction::RequestFailed => "fail accounts request",
        }
    }
}

pub fn extension_transition(
    from: ExtensionState,
    action: ExtensionAction,
) -> Result<(ExtensionState, StateTransition<ExtensionState>), ConnectorError> {
    use ExtensionAction as A;
    use ExtensionState as S;

    let (to, reason) = match (from, action) {
        (S::Installing, A::ProviderMissing) => (S::Installing, "installation pending"),
        (
            S::Undetermined | S::NotAvailable | S::AvailableDisconnected | S::AvailableConnected,
            A::ProviderMissing,
        ) => (S::NotAvailable, "provider not detected"),
        (S::Undetermined | S::NotAvailable | S::Installing, A::ProviderDetected) => {
            (S::AvailableDisconnected, "provider detected")
        }
        (
            S::Undetermined
            | S::NotAvailable
            | S::Installing
            | S::AvailableDisconnected
            | S::AvailableConnected,
            A::AccountsKnown,
        ) => (S::AvailableConnected, "accounts pushed by provider"),
        (S::AvailableDisconnected | S::AvailableConnected, A::AccountsCleared) => {
            (S::AvailableDisconnected, "provider cleared accounts")
        }
        (S::NotAvailable, A::InstallRequested) => (S::Installing, "installation prompted"),
        (S::AvailableDisconnected | S::AvailableConnected, A::RequestAccounts) => {
            (S::AccountsRequested, "accounts requested")
        }
        (S::AccountsRequested, A::RequestSucceeded) => {
            (S::AvailableConnected, "accounts request resolved")
        }
        (S::AccountsRequested, A::RequestFailed) => {
            (S::AvailableDisconnected, "accounts request failed")
        }
        _ => {
            return Err(ConnectorError::NotReady {
                connector: ProviderKind::Extension,
                state: from.name(),
                action: action.name(),
            })
        }
    };
    Ok((to, StateTransition { from, to, reason }))
}
