use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ports::ConnectorError;

/// Wallet provider family an account was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Extension,
    Hardware,
}

impl ProviderKind {
    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::Extension => "MetaMask",
            ProviderKind::Hardware => "Trezor",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Extension => f.write_str("extension"),
            ProviderKind::Hardware => f.write_str("hardware"),
        }
    }
}

/// One address reachable through one provider. The address format is
/// provider-defined and is never parsed by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub origin: ProviderKind,
}

impl Account {
    pub fn new(address: impl Into<String>, origin: ProviderKind) -> Self {
        Self {
            address: address.into(),
            origin,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConnectorError> {
        if self.address.trim().is_empty() {
            return Err(ConnectorError::InvalidAccount(format!(
                "{} account without address",
                self.origin
            )));
        }
        Ok(())
    }
}

/// Selects which address a hardware wallet derives from its key hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivationPath(pub String);

impl DerivationPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `m/44'/60'/{n}'/0/0` for the first `count` Ethereum accounts.
    pub fn ethereum_accounts(count: u32) -> Vec<Self> {
        (0..count)
            .map(|n| Self(format!("m/44'/60'/{n}'/0/0")))
            .collect()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity the device bridge requires before it accepts requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    pub contact: String,
    pub app_url: String,
}

/// Hardware connector configuration as loaded from the environment.
/// Both identity strings are optional here so that their absence can be
/// reported as `MissingConfiguration` instead of failing at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareConfig {
    pub contact: Option<String>,
    pub app_url: Option<String>,
    pub derivation_paths: Vec<DerivationPath>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            contact: None,
            app_url: None,
            derivation_paths: DerivationPath::ethereum_accounts(3),
        }
    }
}

impl HardwareConfig {
    pub fn manifest(&self) -> Result<ManifestConfig, ConnectorError> {
        let contact = non_empty(self.contact.as_deref())
            .ok_or(ConnectorError::MissingConfiguration("developer contact"))?;
        let app_url = non_empty(self.app_url.as_deref())
            .ok_or(ConnectorError::MissingConfiguration("application url"))?;
        Ok(ManifestConfig {
            contact: contact.to_owned(),
            app_url: app_url.to_owned(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Answer of the device bridge settings query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSettings {
    Initialized,
    NotInitialized { code: String, message: String },
}

/// The codes the hardware connector knows how to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceErrorCode {
    NeedsManifest,
    Unhandled(String),
}

impl DeviceErrorCode {
    pub const NOT_INITIALIZED: &'static str = "Init_NotInitialized";
    pub const MANIFEST_MISSING: &'static str = "Init_ManifestMissing";

    pub fn classify(code: &str) -> Self {
        match code {
            Self::NOT_INITIALIZED | Self::MANIFEST_MISSING => Self::NeedsManifest,
            other => Self::Unhandled(other.to_owned()),
        }
    }
}

/// What the UI shows for one connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorStatus {
    pub kind: ProviderKind,
    pub state: &'static str,
    pub label: &'static str,
    /// Whether `connect` is accepted in the current state.
    pub actionable: bool,
}
