pub mod config;
pub mod eip1193;
mod timeout;
pub mod trezor;

use wallet_connect_core::{ConnectionOrchestrator, ConnectorError};

pub use config::{ConnectorConfig, RuntimeProfile};
pub use eip1193::Eip1193Adapter;
pub use trezor::TrezorConnectAdapter;

pub type WalletOrchestrator = ConnectionOrchestrator<TrezorConnectAdapter, Eip1193Adapter>;

/// Wires both runtime adapters from one configuration. Fails with
/// `MissingConfiguration` before any bridge call when the manifest identity
/// is incomplete.
pub fn build_orchestrator(config: &ConnectorConfig) -> Result<WalletOrchestrator, ConnectorError> {
    ConnectionOrchestrator::new(
        TrezorConnectAdapter::with_config(config.clone()),
        Eip1193Adapter::with_config(config.clone()),
        &config.hardware_config(),
    )
}
