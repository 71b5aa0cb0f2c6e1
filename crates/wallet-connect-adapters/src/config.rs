use tracing::warn;

use wallet_connect_core::{DerivationPath, HardwareConfig};

pub const ENV_DEVELOPER_EMAIL: &str = "WALLET_CONNECT_DEVELOPER_EMAIL";
pub const ENV_APP_URL: &str = "WALLET_CONNECT_APP_URL";
pub const ENV_DERIVATION_PATHS: &str = "WALLET_CONNECT_DERIVATION_PATHS";
pub const ENV_BRIDGE_TIMEOUT_MS: &str = "WALLET_CONNECT_BRIDGE_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "WALLET_CONNECT_POLL_INTERVAL_MS";
pub const ENV_EIP1193_PROXY_URL: &str = "WALLET_CONNECT_EIP1193_PROXY_URL";
pub const ENV_RUNTIME_PROFILE: &str = "WALLET_CONNECT_RUNTIME_PROFILE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeProfile {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub developer_email: Option<String>,
    pub app_url: Option<String>,
    pub derivation_paths: Vec<DerivationPath>,
    pub bridge_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub eip1193_proxy_url: Option<String>,
    pub runtime_profile: RuntimeProfile,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            developer_email: None,
            app_url: None,
            derivation_paths: DerivationPath::ethereum_accounts(3),
            bridge_timeout_ms: 30_000,
            poll_interval_ms: 1_000,
            eip1193_proxy_url: None,
            runtime_profile: RuntimeProfile::Development,
        }
    }
}

impl ConnectorConfig {
    /// Reads the process environment, falling back to values baked in at
    /// compile time (browser builds have no runtime environment).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| compiled(key)))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let derivation_paths = read(ENV_DERIVATION_PATHS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(DerivationPath::new)
                    .collect::<Vec<_>>()
            })
            .filter(|paths| !paths.is_empty())
            .unwrap_or(defaults.derivation_paths);

        let runtime_profile = match read(ENV_RUNTIME_PROFILE).as_deref() {
            None => defaults.runtime_profile,
            Some(raw) if raw.eq_ignore_ascii_case("production") => RuntimeProfile::Production,
            Some(raw) if raw.eq_ignore_ascii_case("development") => RuntimeProfile::Development,
            Some(raw) => {
                warn!(key = ENV_RUNTIME_PROFILE, value = raw, "unknown runtime profile, using default");
                defaults.runtime_profile
            }
        };

        Self {
            developer_email: read(ENV_DEVELOPER_EMAIL),
            app_url: read(ENV_APP_URL),
            derivation_paths,
            bridge_timeout_ms: parse_u64(ENV_BRIDGE_TIMEOUT_MS, read(ENV_BRIDGE_TIMEOUT_MS))
                .unwrap_or(defaults.bridge_timeout_ms),
            poll_interval_ms: parse_u64(ENV_POLL_INTERVAL_MS, read(ENV_POLL_INTERVAL_MS))
                .unwrap_or(defaults.poll_interval_ms),
            eip1193_proxy_url: read(ENV_EIP1193_PROXY_URL),
            runtime_profile,
        }
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn hardware_config(&self) -> HardwareConfig {
        HardwareConfig {
            contact: self.developer_email.clone(),
            app_url: self.app_url.clone(),
            derivation_paths: self.derivation_paths.clone(),
        }
    }
}

fn parse_u64(key: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(key, value = %raw, "invalid duration, using default");
            None
        }
    }
}

fn compiled(key: &str) -> Option<String> {
    let value = match key {
        ENV_DEVELOPER_EMAIL => option_env!("WALLET_CONNECT_DEVELOPER_EMAIL"),
        ENV_APP_URL => option_env!("WALLET_CONNECT_APP_URL"),
        ENV_DERIVATION_PATHS => option_env!("WALLET_CONNECT_DERIVATION_PATHS"),
        ENV_BRIDGE_TIMEOUT_MS => option_env!("WALLET_CONNECT_BRIDGE_TIMEOUT_MS"),
        ENV_POLL_INTERVAL_MS => option_env!("WALLET_CONNECT_POLL_INTERVAL_MS"),
        ENV_EIP1193_PROXY_URL => option_env!("WALLET_CONNECT_EIP1193_PROXY_URL"),
        ENV_RUNTIME_PROFILE => option_env!("WALLET_CONNECT_RUNTIME_PROFILE"),
        _ => None,
    };
    value.map(str::to_owned)
}
