use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address};
use serde_json::Value;
use tracing::debug;

use wallet_connect_core::{
    DerivationPath, DeviceBridgePort, DeviceErrorCode, DeviceSettings, ManifestConfig, PortError,
};

use crate::timeout::{bounded, simulate_latency};
use crate::ConnectorConfig;

const DETERMINISTIC_SEED: &str = "wallet-connect-deterministic-trezor";

/// Device bridge backed by the Trezor Connect library in the browser, or by
/// an in-process device elsewhere.
#[derive(Debug, Clone)]
pub struct TrezorConnectAdapter {
    mode: BridgeMode,
    state: Arc<Mutex<DeviceState>>,
    timeout_ms: u64,
}

#[derive(Debug, Clone)]
enum BridgeMode {
    Disabled(String),
    Deterministic,
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug)]
struct DeviceState {
    initialized: bool,
    init_takes_effect: bool,
    pending_code: String,
    settings_failure: Option<PortError>,
    init_failure: Option<PortError>,
    addresses_failure: Option<PortError>,
    latency_ms: u64,
    manifest: Option<ManifestConfig>,
    calls: Vec<&'static str>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            initialized: false,
            init_takes_effect: true,
            pending_code: DeviceErrorCode::NOT_INITIALIZED.to_owned(),
            settings_failure: None,
            init_failure: None,
            addresses_failure: None,
            latency_ms: 0,
            manifest: None,
            calls: Vec::new(),
        }
    }
}

impl Default for TrezorConnectAdapter {
    fn default() -> Self {
        Self::with_config(ConnectorConfig::from_env())
    }
}

impl TrezorConnectAdapter {
    pub fn with_config(config: ConnectorConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        let mode = BridgeMode::Browser;

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if config.strict_runtime_required() {
            BridgeMode::Disabled(
                "Trezor Connect is only reachable from a browser runtime".to_owned(),
            )
        } else {
            BridgeMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(DeviceState::default())),
            timeout_ms: config.bridge_timeout_ms,
        }
    }

    /// In-process device that reports `Init_NotInitialized` until it
    /// receives a manifest.
    pub fn deterministic(timeout_ms: u64) -> Self {
        Self {
            mode: BridgeMode::Deterministic,
            state: Arc::new(Mutex::new(DeviceState::default())),
            timeout_ms,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self.mode, BridgeMode::Deterministic)
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let BridgeMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, DeviceState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("device lock poisoned: {e}")))
    }

    pub fn debug_set_initialized(&self, initialized: bool) -> Result<(), PortError> {
        self.lock()?.initialized = initialized;
        Ok(())
    }

    /// Makes `initialize` resolve without the device leaving the
    /// uninitialized state, the way a browser blocking third-party storage
    /// behaves.
    pub fn debug_ignore_initialize(&self) -> Result<(), PortError> {
        self.lock()?.init_takes_effect = false;
        Ok(())
    }

    pub fn debug_set_pending_code(&self, code: &str) -> Result<(), PortError> {
        self.lock()?.pending_code = code.to_owned();
        Ok(())
    }

    pub fn debug_fail_next_settings(&self, err: PortError) -> Result<(), PortError> {
        self.lock()?.settings_failure = Some(err);
        Ok(())
    }

    pub fn debug_fail_next_initialize(&self, err: PortError) -> Result<(), PortError> {
        self.lock()?.init_failure = Some(err);
        Ok(())
    }

    pub fn debug_fail_next_addresses(&self, err: PortError) -> Result<(), PortError> {
        self.lock()?.addresses_failure = Some(err);
        Ok(())
    }

    pub fn debug_set_latency_ms(&self, latency_ms: u64) -> Result<(), PortError> {
        self.lock()?.latency_ms = latency_ms;
        Ok(())
    }

    pub fn debug_calls(&self) -> Result<Vec<&'static str>, PortError> {
        Ok(self.lock()?.calls.clone())
    }

    pub fn debug_manifest(&self) -> Result<Option<ManifestConfig>, PortError> {
        Ok(self.lock()?.manifest.clone())
    }

    async fn deterministic_settings(&self) -> Result<DeviceSettings, PortError> {
        let mut g = self.lock()?;
        g.calls.push("get_settings");
        if let Some(err) = g.settings_failure.take() {
            return Err(err);
        }
        if g.initialized {
            return Ok(DeviceSettings::Initialized);
        }
        Ok(DeviceSettings::NotInitialized {
            code: g.pending_code.clone(),
            message: "TrezorConnect not yet initialized".to_owned(),
        })
    }

    async fn deterministic_initialize(&self, manifest: &ManifestConfig) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.calls.push("initialize");
        if let Some(err) = g.init_failure.take() {
            return Err(err);
        }
        g.manifest = Some(manifest.clone());
        if g.init_takes_effect {
            g.initialized = true;
        }
        Ok(())
    }

    async fn deterministic_addresses(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<String>, PortError> {
        let latency_ms = {
            let mut g = self.lock()?;
            g.calls.push("get_addresses");
            g.latency_ms
        };
        simulate_latency(latency_ms).await;
        let mut g = self.lock()?;
        if let Some(err) = g.addresses_failure.take() {
            return Err(err);
        }
        if !g.initialized {
            return Err(PortError::Policy("device bridge not initialized".to_owned()));
        }
        Ok(paths.iter().map(deterministic_address).collect())
    }

    #[cfg(target_arch = "wasm32")]
    async fn browser_call(&self, method: &str, args: Option<Value>) -> Result<Value, PortError> {
        use wasm_bindgen::JsCast;

        use crate::eip1193::{function_prop, get_prop};

        let window =
            web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
        let connect = get_prop(&window.into(), "TrezorConnect")?;
        if connect.is_null() || connect.is_undefined() {
            return Err(PortError::NotFound("window.TrezorConnect missing".to_owned()));
        }
        let method_fn = function_prop(&connect, method)?;
        let promise_js = match args {
            Some(args) => {
                let args_js = serde_wasm_bindgen::to_value(&args).map_err(|e| {
                    PortError::Transport(format!("failed to encode {method} arguments: {e}"))
                })?;
                method_fn.call1(&connect, &args_js)
            }
            None => method_fn.call0(&connect),
        }
        .map_err(|e| PortError::Transport(format!("TrezorConnect.{method} dispatch failed: {e:?}")))?;
        let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
            PortError::Transport(format!("TrezorConnect.{method} did not return Promise"))
        })?;
        let result_js = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| PortError::Transport(format!("TrezorConnect.{method} rejected: {e:?}")))?;
        if result_js.is_undefined() || result_js.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result_js).map_err(|e| {
            PortError::Transport(format!("failed to decode {method} response: {e}"))
        })
    }
}

impl DeviceBridgePort for TrezorConnectAdapter {
    async fn get_settings(&self) -> Result<DeviceSettings, PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, BridgeMode::Browser) {
            let response = bounded(self.timeout_ms, self.browser_call("getSettings", None)).await?;
            return parse_settings(&response);
        }

        bounded(self.timeout_ms, self.deterministic_settings()).await
    }

    async fn initialize(&self, manifest: &ManifestConfig) -> Result<(), PortError> {
        self.check_mode()?;
        debug!(contact = %manifest.contact, app_url = %manifest.app_url, "initializing device bridge");

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, BridgeMode::Browser) {
            let args = serde_json::json!({
                "manifest": { "email": manifest.contact, "appUrl": manifest.app_url },
                "lazyLoad": true,
            });
            bounded(self.timeout_ms, self.browser_call("init", Some(args))).await?;
            return Ok(());
        }

        bounded(self.timeout_ms, self.deterministic_initialize(manifest)).await
    }

    async fn get_addresses(&self, paths: &[DerivationPath]) -> Result<Vec<String>, PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, BridgeMode::Browser) {
            let bundle: Vec<Value> = paths
                .iter()
                .map(|path| serde_json::json!({ "path": path.as_str(), "showOnTrezor": false }))
                .collect();
            let args = serde_json::json!({ "bundle": bundle });
            let response = bounded(
                self.timeout_ms,
                self.browser_call("ethereumGetAddress", Some(args)),
            )
            .await?;
            return parse_addresses(&response);
        }

        bounded(self.timeout_ms, self.deterministic_addresses(paths)).await
    }
}

pub fn deterministic_address(path: &DerivationPath) -> String {
    let word = keccak256(format!("{DETERMINISTIC_SEED}:{path}").as_bytes());
    Address::from_word(word).to_checksum(None)
}

/// `{success, payload}` envelope returned by every Trezor Connect call.
pub fn parse_settings(response: &Value) -> Result<DeviceSettings, PortError> {
    if response.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(DeviceSettings::Initialized);
    }
    let payload = response
        .get("payload")
        .ok_or_else(|| PortError::Transport("getSettings: payload missing".to_owned()))?;
    let code = payload
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let message = payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    Ok(DeviceSettings::NotInitialized { code, message })
}

pub fn parse_addresses(response: &Value) -> Result<Vec<String>, PortError> {
    let payload = response
        .get("payload")
        .ok_or_else(|| PortError::Transport("ethereumGetAddress: payload missing".to_owned()))?;
    if response.get("success").and_then(Value::as_bool) != Some(true) {
        let reason = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown device error");
        return Err(PortError::Policy(format!("ethereumGetAddress failed: {reason}")));
    }
    let entries = payload
        .as_array()
        .ok_or_else(|| PortError::Transport("ethereumGetAddress: array expected".to_owned()))?;
    entries
        .iter()
        .map(|entry| {
            let raw = entry.get("address").and_then(Value::as_str).ok_or_else(|| {
                PortError::Transport("ethereumGetAddress: address missing".to_owned())
            })?;
            crate::eip1193::normalize_address(raw)
        })
        .collect()
}
