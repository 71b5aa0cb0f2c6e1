#![allow(dead_code)]

use wallet_connect_adapters::{
    ConnectorConfig, Eip1193Adapter, RuntimeProfile, TrezorConnectAdapter, WalletOrchestrator,
};
use wallet_connect_core::ConnectionOrchestrator;

pub const TEST_TIMEOUT_MS: u64 = 50;

pub fn dev_config() -> ConnectorConfig {
    ConnectorConfig {
        developer_email: Some("dev@example.org".to_owned()),
        app_url: Some("https://wallet.example.org".to_owned()),
        bridge_timeout_ms: TEST_TIMEOUT_MS,
        runtime_profile: RuntimeProfile::Development,
        ..ConnectorConfig::default()
    }
}

pub fn new_orchestrator() -> WalletOrchestrator {
    ConnectionOrchestrator::new(
        TrezorConnectAdapter::deterministic(TEST_TIMEOUT_MS),
        Eip1193Adapter::deterministic(TEST_TIMEOUT_MS),
        &dev_config().hardware_config(),
    )
    .expect("build orchestrator")
}
