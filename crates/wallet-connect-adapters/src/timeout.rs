use std::future::Future;

use wallet_connect_core::PortError;

/// Bounds one bridge call. Expiry surfaces as `PortError::Timeout`; the
/// native implementation needs a tokio runtime with the time driver.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn bounded<T>(
    timeout_ms: u64,
    call: impl Future<Output = Result<T, PortError>>,
) -> Result<T, PortError> {
    tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), call)
        .await
        .map_err(|_| PortError::Timeout(timeout_ms))?
}

// Browser wallets enforce their own popup and iframe timeouts.
#[cfg(target_arch = "wasm32")]
pub(crate) async fn bounded<T>(
    _timeout_ms: u64,
    call: impl Future<Output = Result<T, PortError>>,
) -> Result<T, PortError> {
    call.await
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(latency_ms)).await;
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) async fn simulate_latency(_latency_ms: u64) {}
