use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::Address;
use serde_json::Value;
use tracing::{debug, info};

use wallet_connect_core::{AccountsFeed, AccountsSubscription, ExtensionProviderPort, PortError};

use crate::timeout::{bounded, simulate_latency};
use crate::ConnectorConfig;

pub const INSTALL_URL: &str = "https://metamask.io/download/";

const DETERMINISTIC_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";

/// EIP-1193 extension provider. Runs against `window.ethereum` in the
/// browser, against a JSON-RPC proxy on native when one is configured, and
/// otherwise against an in-process deterministic wallet.
#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
    timeout_ms: u64,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    #[cfg(not(target_arch = "wasm32"))]
    Proxy(ProxyRuntime),
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Clone)]
#[cfg(not(target_arch = "wasm32"))]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug)]
struct ProviderState {
    installed: bool,
    authorized: bool,
    accounts: Vec<String>,
    next_failure: Option<PortError>,
    latency_ms: u64,
    subscribers: BTreeMap<u64, AccountsFeed>,
    next_subscriber: u64,
    request_count: u64,
    install_prompts: u64,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            installed: true,
            authorized: false,
            accounts: vec![DETERMINISTIC_ACCOUNT.to_owned()],
            next_failure: None,
            latency_ms: 0,
            subscribers: BTreeMap::new(),
            next_subscriber: 0,
            request_count: 0,
            install_prompts: 0,
        }
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(ConnectorConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: ConnectorConfig) -> Self {
        // Availability is checked on every drive, so a wallet installed
        // after startup is still picked up.
        #[cfg(target_arch = "wasm32")]
        let mode = ProviderMode::Browser;

        #[cfg(not(target_arch = "wasm32"))]
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = std::time::Duration::from_millis(config.bridge_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
            timeout_ms: config.bridge_timeout_ms,
        }
    }

    /// In-process wallet with one pre-funded account that has not yet
    /// authorized this site.
    pub fn deterministic(timeout_ms: u64) -> Self {
        Self {
            mode: ProviderMode::Deterministic,
            state: Arc::new(Mutex::new(ProviderState::default())),
            timeout_ms,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self.mode, ProviderMode::Deterministic)
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<String>) -> Result<(), PortError> {
        let accounts = accounts
            .iter()
            .map(|raw| normalize_address(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let mut g = self.lock()?;
        g.authorized = !accounts.is_empty();
        g.accounts = accounts.clone();
        for feed in g.subscribers.values() {
            feed.push(accounts.clone())?;
        }
        Ok(())
    }

    pub fn debug_set_installed(&self, installed: bool) -> Result<(), PortError> {
        self.lock()?.installed = installed;
        Ok(())
    }

    pub fn debug_fail_next_request(&self, err: PortError) -> Result<(), PortError> {
        self.lock()?.next_failure = Some(err);
        Ok(())
    }

    pub fn debug_set_latency_ms(&self, latency_ms: u64) -> Result<(), PortError> {
        self.lock()?.latency_ms = latency_ms;
        Ok(())
    }

    pub fn debug_subscriber_count(&self) -> Result<usize, PortError> {
        Ok(self.lock()?.subscribers.len())
    }

    pub fn debug_request_count(&self) -> Result<u64, PortError> {
        Ok(self.lock()?.request_count)
    }

    pub fn debug_install_prompts(&self) -> Result<u64, PortError> {
        Ok(self.lock()?.install_prompts)
    }

    async fn deterministic_request_accounts(&self) -> Result<Vec<String>, PortError> {
        let latency_ms = self.lock()?.latency_ms;
        simulate_latency(latency_ms).await;
        let mut g = self.lock()?;
        g.request_count = g.request_count.saturating_add(1);
        if let Some(err) = g.next_failure.take() {
            return Err(err);
        }
        if !g.installed {
            return Err(PortError::NotFound("extension provider not installed".to_owned()));
        }
        g.authorized = true;
        Ok(g.accounts.clone())
    }

    fn register_feed(&self) -> Result<AccountsSubscription, PortError> {
        let feed = AccountsFeed::default();
        let id = {
            let mut g = self.lock()?;
            let id = g.next_subscriber;
            g.next_subscriber = g.next_subscriber.saturating_add(1);
            g.subscribers.insert(id, feed.clone());
            id
        };
        let state = Arc::clone(&self.state);
        Ok(AccountsSubscription::new(feed, move || {
            if let Ok(mut g) = state.lock() {
                g.subscribers.remove(&id);
            }
        }))
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn proxy_call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            _ => {
                return Err(PortError::NotImplemented(
                    "eip1193 proxy runtime not enabled",
                ))
            }
        };

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = proxy
            .client
            .post(&proxy.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy json decode failed: {e}")))?;
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {}: {}",
                status, body
            )));
        }
        if let Some(err) = body.get("error") {
            return Err(PortError::Policy(format!(
                "eip1193 proxy returned error: {err}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }

    #[cfg(target_arch = "wasm32")]
    async fn wasm_request(&self, method: &str, params: Value) -> Result<Value, PortError> {
        use wasm_bindgen::JsCast;

        let provider = browser_provider()?;
        let request_fn = function_prop(&provider, "request")?;

        let request = serde_json::json!({
            "method": method,
            "params": params,
        });
        let request_js = serde_wasm_bindgen::to_value(&request)
            .map_err(|e| PortError::Transport(format!("failed to encode wasm request: {e}")))?;
        let promise_js = request_fn.call1(&provider, &request_js).map_err(|e| {
            PortError::Transport(format!("provider request dispatch failed: {e:?}"))
        })?;
        let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
            PortError::Transport("provider request did not return Promise".to_owned())
        })?;
        let result_js = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| PortError::Policy(format!("provider request rejected: {e:?}")))?;
        serde_wasm_bindgen::from_value(result_js)
            .map_err(|e| PortError::Transport(format!("failed to decode wasm response: {e}")))
    }

    #[cfg(target_arch = "wasm32")]
    fn browser_subscribe(&self) -> Result<AccountsSubscription, PortError> {
        use wasm_bindgen::{closure::Closure, JsCast, JsValue};

        let provider = browser_provider()?;
        let on_fn = function_prop(&provider, "on")
            .or_else(|_| function_prop(&provider, "addListener"))?;
        let remove_fn = function_prop(&provider, "removeListener")?;

        let feed = AccountsFeed::default();
        let sink = feed.clone();
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Err(e) = sink.push(js_accounts(&value)) {
                tracing::warn!(error = %e, "dropping accountsChanged notification");
            }
        });

        on_fn
            .call2(
                &provider,
                &JsValue::from_str("accountsChanged"),
                callback.as_ref().unchecked_ref(),
            )
            .map_err(|e| PortError::Transport(format!("register accountsChanged failed: {e:?}")))?;

        Ok(AccountsSubscription::new(feed, move || {
            let _ = remove_fn.call2(
                &provider,
                &JsValue::from_str("accountsChanged"),
                callback.as_ref().unchecked_ref(),
            );
            drop(callback);
        }))
    }
}

impl ExtensionProviderPort for Eip1193Adapter {
    fn is_available(&self) -> bool {
        match &self.mode {
            ProviderMode::Disabled(_) => false,
            ProviderMode::Deterministic => self.lock().map(|g| g.installed).unwrap_or(false),
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(_) => true,
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => browser_provider().is_ok(),
        }
    }

    fn known_accounts(&self) -> Result<Vec<String>, PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            let provider = browser_provider()?;
            let selected = get_prop(&provider, "selectedAddress")?;
            return match selected.as_string() {
                Some(raw) => Ok(vec![normalize_address(&raw)?]),
                None => Ok(Vec::new()),
            };
        }

        let g = self.lock()?;
        if g.authorized && g.installed {
            return Ok(g.accounts.clone());
        }
        Ok(Vec::new())
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            let result = bounded(
                self.timeout_ms,
                self.wasm_request("eth_requestAccounts", serde_json::json!([])),
            )
            .await?;
            return parse_accounts(&result);
        }

        #[cfg(not(target_arch = "wasm32"))]
        if matches!(self.mode, ProviderMode::Proxy(_)) {
            let result = bounded(
                self.timeout_ms,
                self.proxy_call("eth_requestAccounts", serde_json::json!([])),
            )
            .await?;
            let accounts = parse_accounts(&result)?;
            let mut g = self.lock()?;
            g.request_count = g.request_count.saturating_add(1);
            g.authorized = true;
            g.accounts = accounts.clone();
            debug!(count = accounts.len(), "eip1193 proxy returned accounts");
            return Ok(accounts);
        }

        bounded(self.timeout_ms, self.deterministic_request_accounts()).await
    }

    fn subscribe_accounts_changed(&self) -> Result<AccountsSubscription, PortError> {
        self.check_mode()?;

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            return self.browser_subscribe();
        }

        // The proxy has no push channel; its feed stays registered but
        // silent.
        self.register_feed()
    }

    fn prompt_installation(&self) -> Result<(), PortError> {
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => {
                let mut g = self.lock()?;
                g.install_prompts = g.install_prompts.saturating_add(1);
                g.installed = true;
                info!(url = INSTALL_URL, "simulated extension installation");
                Ok(())
            }
            #[cfg(not(target_arch = "wasm32"))]
            ProviderMode::Proxy(_) => Err(PortError::NotImplemented(
                "eip1193 proxy cannot prompt installation",
            )),
            #[cfg(target_arch = "wasm32")]
            ProviderMode::Browser => {
                let window = web_sys::window()
                    .ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
                window
                    .open_with_url_and_target(INSTALL_URL, "_blank")
                    .map_err(|e| PortError::Transport(format!("open install page failed: {e:?}")))?;
                Ok(())
            }
        }
    }
}

/// EIP-55 checksum form, so the same address reported in different case by
/// two providers deduplicates in the registry.
pub fn normalize_address(raw: &str) -> Result<String, PortError> {
    let parsed: Address = raw
        .trim()
        .parse()
        .map_err(|e| PortError::Validation(format!("invalid account address {raw}: {e}")))?;
    Ok(parsed.to_checksum(None))
}

fn parse_accounts(value: &Value) -> Result<Vec<String>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport("eth_requestAccounts: array expected".to_owned()))?;
    arr.iter()
        .map(|item| {
            let raw = item.as_str().ok_or_else(|| {
                PortError::Transport("eth_requestAccounts: string expected".to_owned())
            })?;
            normalize_address(raw)
        })
        .collect()
}

#[cfg(target_arch = "wasm32")]
fn js_accounts(value: &wasm_bindgen::JsValue) -> Vec<String> {
    if !js_sys::Array::is_array(value) {
        return Vec::new();
    }
    js_sys::Array::from(value)
        .iter()
        .filter_map(|item| item.as_string())
        .filter_map(|raw| match normalize_address(&raw) {
            Ok(address) => Some(address),
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable accountsChanged address");
                None
            }
        })
        .collect()
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn get_prop(
    target: &wasm_bindgen::JsValue,
    key: &str,
) -> Result<wasm_bindgen::JsValue, PortError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read property {key} failed: {e:?}")))
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn function_prop(
    target: &wasm_bindgen::JsValue,
    key: &str,
) -> Result<js_sys::Function, PortError> {
    use wasm_bindgen::JsCast;

    get_prop(target, key)?
        .dyn_into::<js_sys::Function>()
        .map_err(|_| PortError::NotFound(format!("{key} is not a function")))
}
