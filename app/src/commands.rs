use crate::service::InvoiceService;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use automint_core::models::CreateInvoiceRequest;
use automint_core::parsing::format_eth_amount;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Credit an account with test ETH
    Fund {
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: String,
    },
    /// Show an account balance
    Balance {
        #[arg(long)]
        account: String,
    },
    /// Create an invoice
    Create(CreateArgs),
    /// Pay an invoice with the exact invoiced amount
    Pay {
        #[arg(long = "as")]
        caller: String,
        invoice_id: u64,
    },
    /// Withdraw a paid invoice's proceeds to its merchant
    Withdraw {
        #[arg(long = "as")]
        caller: String,
        invoice_id: u64,
    },
    /// Sweep accumulated platform fees to the ledger owner
    WithdrawFees {
        #[arg(long = "as")]
        caller: String,
    },
    /// Hand ledger ownership to another account
    TransferOwnership {
        #[arg(long = "as")]
        caller: String,
        new_owner: String,
    },
    /// Give up ledger ownership for good
    RenounceOwnership {
        #[arg(long = "as")]
        caller: String,
    },
    /// Show a single invoice
    Show { invoice_id: u64 },
    /// List invoices a wallet created or paid
    List {
        #[arg(long)]
        wallet: String,
    },
    /// Earnings for a merchant
    Summary {
        #[arg(long)]
        wallet: String,
    },
    /// Platform fee totals and ledger owner
    Fees,
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long = "as")]
    pub caller: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub billed_to: String,
    /// Amount in ETH
    #[arg(long)]
    pub amount: String,
    /// YYYY-MM-DD
    #[arg(long)]
    pub due_date: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Only this wallet may pay
    #[arg(long)]
    pub client_wallet: Option<String>,
    #[arg(long)]
    pub reference: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub tax_info: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    List {
        #[arg(long)]
        wallet: String,
        #[arg(long, default_value_t = store::DEFAULT_NOTIFICATION_LIMIT)]
        limit: usize,
        #[arg(long)]
        unread: bool,
    },
    /// Count unread notifications
    Unread {
        #[arg(long)]
        wallet: String,
    },
    Read { id: String },
    ReadAll {
        #[arg(long)]
        wallet: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    Register {
        #[arg(long = "as")]
        caller: String,
        username: String,
        #[arg(long)]
        email: Option<String>,
    },
    Show {
        #[arg(long)]
        wallet: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        rpc_url: Option<String>,
        #[arg(long)]
        contract_address: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Store a secret (e.g. an RPC API key) in the OS keychain
    SetSecret { key: String, value: String },
    DeleteSecret { key: String },
}

#[derive(Debug, Serialize)]
struct Settings {
    chain_id: u64,
    network: String,
    rpc_url: Option<String>,
    contract_address: Option<String>,
    contract_deployed: bool,
    owner: Option<String>,
    db: String,
    rpc_api_key_set: bool,
}

pub fn parse_address(raw: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid address: {raw}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(service: &InvoiceService, command: Command) -> Result<()> {
    match command {
        Command::Fund { account, amount } => {
            let balance = service.fund(parse_address(&account)?, &amount).await?;
            print_json(&serde_json::json!({ "account": account, "balance": format_eth_amount(balance) }))
        }
        Command::Balance { account } => {
            let balance = service.balance(parse_address(&account)?).await?;
            print_json(&serde_json::json!({ "account": account, "balance": format_eth_amount(balance) }))
        }
        Command::Create(args) => {
            let merchant = parse_address(&args.caller)?;
            let req = CreateInvoiceRequest {
                title: args.title,
                billed_to: args.billed_to,
                client_wallet: args.client_wallet,
                amount: args.amount,
                due_date: args.due_date,
                description: args.description,
                reference_number: args.reference,
                email: args.email,
                tax_info: args.tax_info,
            };
            print_json(&service.create_invoice(merchant, req).await?)
        }
        Command::Pay { caller, invoice_id } => {
            service.pay_invoice(parse_address(&caller)?, invoice_id).await?;
            print_json(&service.invoice_view(invoice_id).await?)
        }
        Command::Withdraw { caller, invoice_id } => {
            let amount = service.withdraw(parse_address(&caller)?, invoice_id).await?;
            print_json(&serde_json::json!({ "invoice_id": invoice_id, "withdrawn": format_eth_amount(amount) }))
        }
        Command::WithdrawFees { caller } => {
            let amount = service.withdraw_platform_fees(parse_address(&caller)?).await?;
            print_json(&serde_json::json!({ "withdrawn": format_eth_amount(amount) }))
        }
        Command::TransferOwnership { caller, new_owner } => {
            service
                .transfer_ownership(parse_address(&caller)?, parse_address(&new_owner)?)
                .await?;
            print_json(&service.fee_report().await?)
        }
        Command::RenounceOwnership { caller } => {
            service.renounce_ownership(parse_address(&caller)?).await?;
            print_json(&service.fee_report().await?)
        }
        Command::Show { invoice_id } => print_json(&service.invoice_view(invoice_id).await?),
        Command::List { wallet } => print_json(&service.list_invoices(parse_address(&wallet)?).await?),
        Command::Summary { wallet } => {
            let s = service.earnings_summary(parse_address(&wallet)?).await?;
            print_json(&serde_json::json!({
                "total_created": s.total_created,
                "total_paid": s.total_paid,
                "total_unpaid": s.total_unpaid,
                "gross_received": format_eth_amount(s.gross_received),
                "platform_fees": format_eth_amount(s.platform_fees),
                "withdrawn_net": format_eth_amount(s.withdrawn_net),
                "pending_net": format_eth_amount(s.pending_net),
            }))
        }
        Command::Fees => {
            let r = service.fee_report().await?;
            print_json(&serde_json::json!({
                "owner": r.owner,
                "accumulated_fees": format_eth_amount(r.accumulated_fees),
                "total_fees_collected": format_eth_amount(r.total_fees_collected),
            }))
        }
        Command::Notifications(cmd) => run_notifications(service, cmd),
        Command::User(cmd) => run_user(service, cmd),
        Command::Settings(cmd) => run_settings(cmd),
    }
}

fn run_notifications(service: &InvoiceService, cmd: NotificationCommand) -> Result<()> {
    match cmd {
        NotificationCommand::List { wallet, limit, unread } => {
            print_json(&service.notifications(parse_address(&wallet)?, unread, limit)?)
        }
        NotificationCommand::Unread { wallet } => {
            let unread = service.unread_count(parse_address(&wallet)?)?;
            print_json(&serde_json::json!({ "unread": unread }))
        }
        NotificationCommand::Read { id } => {
            service.mark_notification_read(&id)?;
            print_json(&serde_json::json!({ "read": id }))
        }
        NotificationCommand::ReadAll { wallet } => {
            let marked = service.mark_all_notifications_read(parse_address(&wallet)?)?;
            print_json(&serde_json::json!({ "marked": marked }))
        }
    }
}

fn run_user(service: &InvoiceService, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Register {
            caller,
            username,
            email,
        } => print_json(&service.register_user(parse_address(&caller)?, &username, email)?),
        UserCommand::Show { wallet } => print_json(&service.user(parse_address(&wallet)?)?),
    }
}

/// Settings commands only touch the config file and keychain.
pub fn run_settings(cmd: SettingsCommand) -> Result<()> {
    match cmd {
        SettingsCommand::Show => {
            let cfg = config::load().unwrap_or_default();
            print_json(&Settings {
                chain_id: cfg.network.chain_id,
                network: cfg.network.name.clone(),
                rpc_url: cfg.network.rpc_url.clone(),
                contract_address: cfg.network.contract_address.clone(),
                contract_deployed: cfg.is_contract_deployed(),
                owner: cfg.owner.clone(),
                db: cfg.store.path.display().to_string(),
                rpc_api_key_set: config::get_secret("rpc_api_key").is_ok(),
            })
        }
        SettingsCommand::Set {
            rpc_url,
            contract_address,
            owner,
            db,
        } => {
            let mut cfg = config::load().unwrap_or_default();
            if let Some(url) = rpc_url {
                cfg.network.rpc_url = Some(url);
            }
            if let Some(address) = contract_address {
                parse_address(&address)?;
                cfg.network.contract_address = Some(address);
            }
            if let Some(owner) = owner {
                parse_address(&owner)?;
                cfg.owner = Some(owner);
            }
            if let Some(path) = db {
                cfg.store.path = path;
            }
            config::store(&cfg)?;
            tracing::info!("Settings updated");
            Ok(())
        }
        SettingsCommand::SetSecret { key, value } => {
            config::store_secret(&key, &value)?;
            tracing::info!(%key, "secret stored");
            Ok(())
        }
        SettingsCommand::DeleteSecret { key } => {
            config::delete_secret(&key)?;
            tracing::info!(%key, "secret deleted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn parses_create_with_optional_fields() {
        let cli = Cli::try_parse_from([
            "automint",
            "create",
            "--as",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "--title",
            "Audit",
            "--billed-to",
            "Acme",
            "--amount",
            "0.3",
            "--due-date",
            "2026-12-01",
            "--client-wallet",
            "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
        ])
        .unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.title, "Audit");
                assert_eq!(args.description, "");
                assert!(args.client_wallet.is_some());
                assert!(args.email.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_notification_defaults() {
        let cli = Cli::try_parse_from(["automint", "notifications", "list", "--wallet", "0x01"]).unwrap();
        match cli.command {
            Command::Notifications(NotificationCommand::List { limit, unread, .. }) => {
                assert_eq!(limit, 20);
                assert!(!unread);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address(" 0x70997970C51812dc3A010C7d01b50e0d17dc79C8 ").is_ok());
    }

    #[test]
    fn parses_renounce_ownership() {
        let cli = Cli::try_parse_from(["automint", "renounce-ownership", "--as", "0x01"]).unwrap();
        assert!(matches!(cli.command, Command::RenounceOwnership { caller } if caller == "0x01"));
    }
}
