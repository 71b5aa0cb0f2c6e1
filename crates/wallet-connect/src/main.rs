//! wallet-connect: pick an account from a Trezor or a MetaMask-style
//! browser extension.

#[cfg(not(target_arch = "wasm32"))]
mod dialog;

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use wallet_connect_adapters::{build_orchestrator, ConnectorConfig};

    use dialog::DialogCommand;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting wallet-connect");

    let config = ConnectorConfig::from_env();
    let orch = build_orchestrator(&config)
        .inspect_err(|e| tracing::error!(error = %e, "connect dialog unavailable"))?;
    orch.on_account_selected(|account| {
        println!("selected {} from {}", account.address, account.origin.label());
    });

    println!("commands: connect <hardware|extension>, retry <hardware|extension>, select <address>, list, status, quit");
    orch.drive().await;
    println!("{}", dialog::render(&orch));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = dialog::drive_ticker(config.poll_interval_ms);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let before = (orch.statuses(), orch.accounts().len());
                orch.drive().await;
                if before != (orch.statuses(), orch.accounts().len()) {
                    println!("{}", dialog::render(&orch));
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<DialogCommand>() {
                    Ok(DialogCommand::Quit) => break,
                    Ok(command) => dialog::run(&orch, command).await,
                    Err(e) => println!("{e}"),
                }
            }
        }
    }

    orch.dispose();
    tracing::info!("wallet-connect stopped");
    Ok(())
}

// Browser builds embed the library crates into the host page instead.
#[cfg(target_arch = "wasm32")]
fn main() {}
