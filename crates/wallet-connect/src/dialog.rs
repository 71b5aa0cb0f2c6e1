//! Text rendering of the connect-wallet dialog: one row per connector with
//! its button label, followed by the merged account list.

use std::str::FromStr;
use std::time::Duration;

use eyre::{bail, eyre};
use tokio::time::{Interval, MissedTickBehavior};

use wallet_connect_adapters::WalletOrchestrator;
use wallet_connect_core::{Account, ConnectCommand, ConnectorStatus, ProviderKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogCommand {
    Connect(ProviderKind),
    Retry(ProviderKind),
    Select(String),
    List,
    Status,
    Quit,
}

fn parse_kind(raw: Option<&str>) -> eyre::Result<ProviderKind> {
    match raw {
        Some("hardware") | Some("trezor") => Ok(ProviderKind::Hardware),
        Some("extension") | Some("metamask") => Ok(ProviderKind::Extension),
        Some(other) => bail!("unknown wallet `{other}`, expected hardware or extension"),
        None => bail!("missing wallet, expected hardware or extension"),
    }
}

impl FromStr for DialogCommand {
    type Err = eyre::Report;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| eyre!("empty command"))?;
        let command = match verb {
            "connect" => Self::Connect(parse_kind(words.next())?),
            "retry" => Self::Retry(parse_kind(words.next())?),
            "select" => Self::Select(
                words
                    .next()
                    .ok_or_else(|| eyre!("missing address"))?
                    .to_owned(),
            ),
            "list" => Self::List,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command `{other}`"),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected argument `{extra}`");
        }
        Ok(command)
    }
}

pub fn render_status(status: &ConnectorStatus) -> String {
    let marker = if status.actionable { ">" } else { " " };
    format!(
        "{marker} {:<8} [{}] {}",
        status.kind.label(),
        status.label,
        status.state
    )
}

pub fn render_accounts(accounts: &[Account], selected: Option<&Account>) -> String {
    if accounts.is_empty() {
        return "  no accounts yet".to_owned();
    }
    accounts
        .iter()
        .map(|account| {
            let marker = if selected.is_some_and(|s| s.address == account.address) {
                "*"
            } else {
                " "
            };
            format!("{marker} {} ({})", account.address, account.origin.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render(orch: &WalletOrchestrator) -> String {
    let mut out: Vec<String> = orch.statuses().iter().map(render_status).collect();
    out.push(render_accounts(
        &orch.accounts(),
        orch.selected_account().as_ref(),
    ));
    out.join("\n")
}

/// Drive schedule. A connect can hold the loop for a whole bridge timeout,
/// so ticks missed meanwhile are skipped rather than replayed.
pub fn drive_ticker(poll_interval_ms: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

pub async fn run(orch: &WalletOrchestrator, command: DialogCommand) {
    let outcome = match command {
        DialogCommand::Connect(kind) => orch.handle(ConnectCommand::Connect(kind)).await.map(drop),
        DialogCommand::Retry(kind) => orch.handle(ConnectCommand::Retry(kind)).await.map(drop),
        DialogCommand::Select(address) => orch.select_account(&address).map(drop),
        DialogCommand::List => {
            println!(
                "{}",
                render_accounts(&orch.accounts(), orch.selected_account().as_ref())
            );
            return;
        }
        DialogCommand::Status | DialogCommand::Quit => Ok(()),
    };
    if let Err(e) = outcome {
        println!("{e}");
    }
    println!("{}", render(orch));
}
