mod commands;
mod service;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{parse_address, Command};
use ledger::{local::LocalLedgerClient, InvoiceLedger};
use service::InvoiceService;
use std::path::PathBuf;
use std::sync::Arc;
use store::Store;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Web3 invoicing: create, pay and withdraw invoices on the invoice ledger.
#[derive(Debug, Parser)]
#[command(name = "automint", version)]
struct Cli {
    /// Store directory (overrides config and AUTOMINT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sled=warn".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load the persisted ledger, or deploy a new one owned by the configured
/// owner on first use.
fn open_ledger(store: &Store, cfg: &config::AppConfig) -> Result<InvoiceLedger> {
    if let Some(ledger) = store.load_ledger()? {
        tracing::debug!(owner=%ledger.owner(), current_id = ledger.get_current_invoice_id(), "ledger loaded");
        return Ok(ledger);
    }
    let owner = cfg
        .owner
        .as_deref()
        .context("No ledger owner configured (set AUTOMINT_OWNER or `settings set --owner`)")?;
    let ledger = InvoiceLedger::new(parse_address(owner)?);
    store.save_ledger(&ledger)?;
    tracing::info!(%owner, network=%cfg.network.name, chain_id = cfg.network.chain_id, "ledger deployed");
    Ok(ledger)
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Settings(cmd) = cli.command {
        return commands::run_settings(cmd);
    }

    let cfg = config::load().unwrap_or_else(|e| {
        tracing::warn!(error=%e, "using default config");
        config::AppConfig::default().with_env_overrides()
    });
    let path = cli.db.unwrap_or_else(|| cfg.store.path.clone());
    let store = Store::open(&path)?;
    let ledger = open_ledger(&store, &cfg)?;
    let client = LocalLedgerClient::with_sink(ledger, Arc::new(store.clone()));
    let service = InvoiceService::new(client, store);

    commands::run(&service, cli.command).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{e:#}"), "command failed");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Address, U256};
    use ledger::{Call, LedgerClient};

    const OWNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const MERCHANT: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn first_run_requires_an_owner() {
        let store = Store::temporary().unwrap();
        let err = open_ledger(&store, &config::AppConfig::default()).unwrap_err();
        assert!(err.to_string().starts_with("No ledger owner configured"));
        assert!(store.load_ledger().unwrap().is_none());
    }

    #[tokio::test]
    async fn deployed_ledger_is_reloaded_with_its_invoices() {
        let store = Store::temporary().unwrap();
        let cfg = config::AppConfig {
            owner: Some(OWNER.to_string()),
            ..Default::default()
        };

        let ledger = open_ledger(&store, &cfg).unwrap();
        assert_eq!(ledger.owner(), OWNER);
        assert_eq!(store.load_ledger().unwrap().unwrap().owner(), OWNER);

        let client = LocalLedgerClient::with_sink(ledger, Arc::new(store.clone()));
        let id = client
            .create_invoice(Call::new(MERCHANT), U256::from(5_000u64), "{}", Address::ZERO)
            .await
            .unwrap();

        let other = config::AppConfig {
            owner: Some(MERCHANT.to_string()),
            ..Default::default()
        };
        let reloaded = open_ledger(&store, &other).unwrap();
        assert_eq!(reloaded.owner(), OWNER);
        assert_eq!(reloaded.get_current_invoice_id(), id);
        assert_eq!(reloaded.get_invoice(id).unwrap().amount, U256::from(5_000u64));
    }
}
