mod common;

use std::rc::Rc;

use tokio::sync::Notify;

use wallet_connect_core::{
    ConnectorError, DeviceSettings, HardwareConfig, HardwareConnector, HardwareState, PortError,
    ProviderKind,
};

use common::{hardware_config, needs_manifest, ScriptedBridge};

#[test]
fn missing_contact_is_rejected_before_any_bridge_call() {
    let bridge = ScriptedBridge::default();
    let calls = Rc::clone(&bridge.calls);
    let config = HardwareConfig {
        contact: None,
        ..hardware_config()
    };

    let err = HardwareConnector::new(bridge, &config).expect_err("must fail");
    assert_eq!(err, ConnectorError::MissingConfiguration("developer contact"));
    assert_eq!(calls.total(), 0);
}

#[test]
fn blank_app_url_counts_as_missing() {
    let config = HardwareConfig {
        app_url: Some("   ".to_owned()),
        ..hardware_config()
    };
    let err = HardwareConnector::new(ScriptedBridge::default(), &config).expect_err("must fail");
    assert_eq!(err, ConnectorError::MissingConfiguration("application url"));
}

#[tokio::test]
async fn connect_before_initialization_is_not_ready_and_skips_bridge() {
    let connector =
        HardwareConnector::new(ScriptedBridge::default(), &hardware_config()).expect("connector");

    let err = connector.connect().await.expect_err("must be rejected");
    assert!(matches!(
        err,
        ConnectorError::NotReady {
            connector: ProviderKind::Hardware,
            state: "undetermined",
            ..
        }
    ));
    assert_eq!(connector.bridge().calls.total(), 0);
    assert_eq!(connector.state(), HardwareState::Undetermined);
}

#[tokio::test]
async fn already_initialized_bridge_goes_straight_to_idle() {
    let bridge = ScriptedBridge::default().with_settings(vec![Ok(DeviceSettings::Initialized)]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
    assert_eq!(connector.bridge().calls.initialize.get(), 0);
    assert!(connector.status().actionable);
    assert_eq!(connector.status().label, "Ready");
}

#[tokio::test]
async fn needs_manifest_triggers_exactly_one_initialize() {
    let bridge = ScriptedBridge::default()
        .with_settings(vec![Ok(needs_manifest()), Ok(DeviceSettings::Initialized)]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
    let calls = &connector.bridge().calls;
    assert_eq!(calls.initialize.get(), 1);
    assert_eq!(calls.get_settings.get(), 2);

    let manifest = connector.bridge().seen_manifest().expect("manifest sent");
    assert_eq!(manifest.contact, "dev@example.org");
    assert_eq!(manifest.app_url, "https://wallet.example.org");

    let path: Vec<_> = connector.history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            HardwareState::InitializationRequested,
            HardwareState::InitializedIdle
        ]
    );
}

#[tokio::test]
async fn manifest_missing_code_is_treated_like_not_initialized() {
    let bridge = ScriptedBridge::default().with_settings(vec![
        Ok(DeviceSettings::NotInitialized {
            code: "Init_ManifestMissing".to_owned(),
            message: "Manifest not set".to_owned(),
        }),
        Ok(DeviceSettings::Initialized),
    ]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
    assert_eq!(connector.bridge().calls.initialize.get(), 1);
}

#[tokio::test]
async fn second_needs_manifest_fails_without_another_initialize() {
    let bridge = ScriptedBridge::default()
        .with_settings(vec![Ok(needs_manifest()), Ok(needs_manifest())]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.initialize.get(), 1);
    assert_eq!(connector.bridge().calls.get_settings.get(), 2);
    assert_eq!(connector.status().label, "Trezor Unavailable");

    // A failed connector is not polled again.
    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.get_settings.get(), 2);
}

#[tokio::test]
async fn rejected_initialize_fails_initialization() {
    let bridge = ScriptedBridge::default()
        .with_settings(vec![Ok(needs_manifest())])
        .failing_initialize(PortError::Transport("iframe blocked".to_owned()));
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.get_settings.get(), 1);
    assert!(matches!(
        connector.last_error(),
        Some(ConnectorError::Bridge(PortError::Transport(_)))
    ));
}

#[tokio::test]
async fn rejected_settings_query_fails_initialization() {
    let bridge = ScriptedBridge::default()
        .with_settings(vec![Err(PortError::Timeout(30_000))]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.initialize.get(), 0);
}

#[tokio::test]
async fn unhandled_code_leaves_state_unchanged() {
    let bridge = ScriptedBridge::default().with_settings(vec![Ok(DeviceSettings::NotInitialized {
        code: "Device_CallInProgress".to_owned(),
        message: "Device call in progress".to_owned(),
    })]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::Undetermined);
    assert_eq!(connector.bridge().calls.initialize.get(), 0);
    assert!(connector.history().is_empty());
    assert_eq!(
        connector.last_error(),
        Some(ConnectorError::UnhandledBridgeCode(
            "Device_CallInProgress".to_owned()
        ))
    );

    // Still pre-init, so the next drive asks again.
    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
}

#[tokio::test]
async fn unhandled_code_after_initialize_fails_initialization() {
    let bridge = ScriptedBridge::default().with_settings(vec![
        Ok(needs_manifest()),
        Ok(DeviceSettings::NotInitialized {
            code: "Device_CallInProgress".to_owned(),
            message: "Device call in progress".to_owned(),
        }),
    ]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.initialize.get(), 1);
    assert_eq!(
        connector.last_error(),
        Some(ConnectorError::UnhandledBridgeCode(
            "Device_CallInProgress".to_owned()
        ))
    );

    // Failed connectors are not polled again.
    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);
    assert_eq!(connector.bridge().calls.get_settings.get(), 2);
}

#[tokio::test]
async fn dropped_initialization_returns_to_not_initialized() {
    let gate = Rc::new(Notify::new());
    let bridge = ScriptedBridge::default()
        .with_settings(vec![Ok(needs_manifest())])
        .gated_initialize(Rc::clone(&gate));
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");

    tokio::select! {
        _ = connector.drive() => panic!("gate never opened"),
        _ = tokio::task::yield_now() => {}
    }
    assert_eq!(connector.state(), HardwareState::NotInitialized);
    assert_eq!(connector.bridge().calls.initialize.get(), 1);
    let path: Vec<_> = connector.history().iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            HardwareState::InitializationRequested,
            HardwareState::NotInitialized,
        ]
    );

    // Pre-init again, so the next drive polls and finds the bridge ready.
    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
}

#[tokio::test]
async fn retry_after_failure_initializes_again() {
    let bridge = ScriptedBridge::default().with_settings(vec![
        Ok(needs_manifest()),
        Ok(needs_manifest()),
        Ok(needs_manifest()),
        Ok(DeviceSettings::Initialized),
    ]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");
    assert_eq!(connector.drive().await, HardwareState::InitializationFailed);

    assert_eq!(connector.retry().expect("retry"), HardwareState::NotInitialized);
    assert_eq!(connector.last_error(), None);
    assert_eq!(connector.drive().await, HardwareState::InitializedIdle);
    assert_eq!(connector.bridge().calls.initialize.get(), 2);
}

#[tokio::test]
async fn connect_tags_configured_paths_as_hardware() {
    let bridge = ScriptedBridge::default().with_addresses(&["0xAA", "0xBB", "0xCC"]);
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");
    connector.drive().await;

    let accounts = connector.connect().await.expect("connect");
    assert_eq!(accounts.len(), 3);
    assert!(accounts.iter().all(|a| a.origin == ProviderKind::Hardware));
    assert_eq!(accounts[1].address, "0xBB");
    assert_eq!(connector.state(), HardwareState::InitializedIdle);

    let paths: Vec<String> = connector
        .bridge()
        .seen_paths()
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(
        paths,
        vec!["m/44'/60'/0'/0/0", "m/44'/60'/1'/0/0", "m/44'/60'/2'/0/0"]
    );
}

#[tokio::test]
async fn failed_retrieval_returns_to_idle() {
    let bridge = ScriptedBridge::default()
        .failing_addresses(PortError::Transport("Permissions not granted".to_owned()));
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");
    connector.drive().await;

    let accounts = connector.connect().await.expect("failure is not surfaced");
    assert!(accounts.is_empty());
    assert_eq!(connector.state(), HardwareState::InitializedIdle);
    assert!(connector.last_error().is_some());
}

#[tokio::test]
async fn connect_while_retrieving_is_rejected() {
    let gate = Rc::new(Notify::new());
    let bridge = ScriptedBridge::default()
        .with_addresses(&["0xAA"])
        .gated(Rc::clone(&gate));
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");
    connector.drive().await;

    let (first, second) = tokio::join!(connector.connect(), async {
        assert_eq!(connector.state(), HardwareState::AccountsRequested);
        assert_eq!(connector.status().label, "Retrieving Accounts...");
        let rejected = connector.connect().await;
        gate.notify_one();
        rejected
    });

    assert_eq!(first.expect("first connect").len(), 1);
    assert!(matches!(
        second,
        Err(ConnectorError::NotReady {
            state: "accounts_requested",
            ..
        })
    ));
    assert_eq!(connector.bridge().calls.get_addresses.get(), 1);
    assert_eq!(connector.state(), HardwareState::InitializedIdle);
}

#[tokio::test]
async fn dropped_retrieval_returns_to_idle() {
    let gate = Rc::new(Notify::new());
    let bridge = ScriptedBridge::default().gated(Rc::clone(&gate));
    let connector = HardwareConnector::new(bridge, &hardware_config()).expect("connector");
    connector.drive().await;

    tokio::select! {
        _ = connector.connect() => panic!("gate never opened"),
        _ = tokio::task::yield_now() => {}
    }
    assert_eq!(connector.state(), HardwareState::InitializedIdle);
}

#[tokio::test]
async fn disposed_connector_rejects_commands() {
    let connector =
        HardwareConnector::new(ScriptedBridge::default(), &hardware_config()).expect("connector");
    connector.dispose();

    assert_eq!(connector.drive().await, HardwareState::Undetermined);
    assert!(connector.connect().await.is_err());
    assert_eq!(connector.bridge().calls.total(), 0);
    assert!(!connector.status().actionable);
}
