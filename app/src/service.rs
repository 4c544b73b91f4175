use alloy_primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use automint_core::models::{
    CreateInvoiceRequest, InvoiceDocument, InvoiceMetadata, InvoiceStatus, InvoiceView, Notification,
    UserProfile, METADATA_VERSION,
};
use automint_core::parsing::{
    build_metadata_uri, compute_sha256_hex, format_eth_amount, parse_eth_amount, parse_metadata_uri,
};
use automint_core::validation::{validate_invoice_request, validate_username};
use chrono::{DateTime, Duration, Utc};
use ledger::{merchant_share, platform_fee, rejection, Call, LedgerClient, LedgerError, LedgerEvent};
use serde::Serialize;
use std::sync::Arc;
use store::{AuditEvent, Store};

const DEFAULT_DUE_DAYS: i64 = 30;

/// Per-merchant earnings, amounts in wei.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EarningsSummary {
    pub total_created: usize,
    pub total_paid: usize,
    pub total_unpaid: usize,
    pub gross_received: U256,
    pub platform_fees: U256,
    pub withdrawn_net: U256,
    pub pending_net: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeReport {
    pub owner: Address,
    pub accumulated_fees: U256,
    pub total_fees_collected: U256,
}

/// Ties the ledger, the document store and notifications together the way
/// the create, pay and bills screens need them.
pub struct InvoiceService {
    ledger: Arc<dyn LedgerClient>,
    store: Store,
}

impl InvoiceService {
    pub fn new(ledger: Arc<dyn LedgerClient>, store: Store) -> Self {
        Self { ledger, store }
    }

    pub async fn fund(&self, account: Address, amount_eth: &str) -> Result<U256> {
        let value = parse_eth_amount(amount_eth)?;
        let balance = self.ledger.deposit(account, value).await?;
        tracing::info!(%account, value=%value, "account funded");
        Ok(balance)
    }

    pub async fn balance(&self, account: Address) -> Result<U256> {
        self.ledger.balance_of(account).await
    }

    pub async fn create_invoice(&self, merchant: Address, req: CreateInvoiceRequest) -> Result<InvoiceDocument> {
        validate_invoice_request(&req).map_err(|errs| anyhow!("Invalid invoice: {}", errs.join("; ")))?;

        let amount = parse_eth_amount(&req.amount)?;
        let client_wallet = match req.client_wallet.as_deref().map(str::trim) {
            Some(w) if !w.is_empty() => Some(w.parse::<Address>().context("Invalid client wallet")?),
            _ => None,
        };
        let merchant_name = self.merchant_name(merchant);
        let now = Utc::now();

        let metadata = InvoiceMetadata {
            title: req.title.trim().to_string(),
            description: req.description.clone(),
            billed_to: req.billed_to.trim().to_string(),
            due_date: req.due_date.trim().to_string(),
            reference_number: non_empty(req.reference_number.clone()),
            email: non_empty(req.email.clone()),
            tax_info: non_empty(req.tax_info.clone()),
            merchant_name: Some(merchant_name.clone()),
            version: METADATA_VERSION.to_string(),
            created_at: Some(now),
        };
        let metadata_uri = build_metadata_uri(&metadata)?;

        let invoice_id = match self
            .ledger
            .create_invoice(
                Call::new(merchant),
                amount,
                &metadata_uri,
                client_wallet.unwrap_or(Address::ZERO),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.audit(
                    AuditEvent::new("invoice_create_failed", "rejected")
                        .with_actor(merchant)
                        .with_error(&e),
                );
                return Err(e.context("Failed to create invoice"));
            }
        };

        let transaction_hash = match self.creation_tx_hash(invoice_id).await {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(invoice_id, error=%e, "creation transaction hash unavailable");
                None
            }
        };

        let doc = InvoiceDocument {
            invoice_id,
            title: metadata.title.clone(),
            billed_to: metadata.billed_to.clone(),
            client_wallet,
            amount: format_eth_amount(amount),
            due_date: metadata.due_date.clone(),
            description: metadata.description.clone(),
            reference_number: metadata.reference_number.clone(),
            email: metadata.email.clone(),
            tax_info: metadata.tax_info.clone(),
            merchant_name: merchant_name.clone(),
            merchant_wallet: merchant,
            status: InvoiceStatus::Unpaid,
            created_at: now,
            paid_at: None,
            paid_by: None,
            metadata_hash: compute_sha256_hex(&metadata_uri),
            transaction_hash,
            payment_hash: None,
        };
        if let Err(e) = self.store.put_invoice(&doc) {
            tracing::warn!(invoice_id, error=%e, "failed to store invoice document");
        }

        if let Some(client) = client_wallet {
            let message = format!(
                "You have received an invoice of {} ETH from {}.",
                doc.amount, merchant_name
            );
            if let Err(e) = self.store.send_notification(
                &client.to_string(),
                invoice_id,
                "New Invoice Received",
                &message,
                Some(&merchant_name),
                Some(&doc.amount),
            ) {
                tracing::warn!(invoice_id, error=%e, "failed to notify client");
            }
        }

        self.audit(
            AuditEvent::new("invoice_created", InvoiceStatus::Unpaid.as_str())
                .with_invoice(invoice_id)
                .with_actor(merchant)
                .with_amount(amount),
        );
        Ok(doc)
    }

    /// Pay `invoice_id` from `payer`, attaching exactly the invoiced amount.
    /// Returns the payment's transaction hash.
    pub async fn pay_invoice(&self, payer: Address, invoice_id: u64) -> Result<String> {
        let invoice = self.ledger.get_invoice(invoice_id).await?;
        if invoice.is_paid {
            bail!("Invoice has already been paid");
        }
        if !invoice.is_open_to(payer) {
            bail!("You are not authorized to pay this invoice");
        }

        let call = Call::new(payer).with_value(invoice.amount);
        let payment_hash = match self.ledger.pay_invoice(call, invoice_id).await {
            Ok(hash) => hash,
            Err(e) => {
                self.audit(
                    AuditEvent::new("payment_failed", InvoiceStatus::Unpaid.as_str())
                        .with_invoice(invoice_id)
                        .with_actor(payer)
                        .with_error(&e),
                );
                return Err(e.context(format!("Payment of invoice {invoice_id} failed")));
            }
        };

        let synced = self
            .store
            .set_status(invoice_id, InvoiceStatus::Paid, Some(payer))
            .and_then(|_| self.store.set_payment_hash(invoice_id, &payment_hash));
        if let Err(e) = synced {
            tracing::warn!(invoice_id, error=%e, "failed to sync invoice status");
        }
        let amount = format_eth_amount(invoice.amount);
        let message = format!("Invoice #{invoice_id} was paid by {payer} ({amount} ETH).");
        if let Err(e) = self.store.send_notification(
            &invoice.merchant.to_string(),
            invoice_id,
            "Invoice Paid",
            &message,
            None,
            Some(&amount),
        ) {
            tracing::warn!(invoice_id, error=%e, "failed to notify merchant");
        }

        self.audit(
            AuditEvent::new("invoice_paid", InvoiceStatus::Paid.as_str())
                .with_invoice(invoice_id)
                .with_actor(payer)
                .with_amount(invoice.amount),
        );
        Ok(payment_hash)
    }

    pub async fn withdraw(&self, merchant: Address, invoice_id: u64) -> Result<U256> {
        let amount = match self
            .ledger
            .withdraw_invoice_funds(Call::new(merchant), invoice_id)
            .await
        {
            Ok(amount) => amount,
            Err(e) => {
                let message = match rejection(&e) {
                    Some(LedgerError::NotMerchant(_)) => "Only the merchant can withdraw these funds".to_string(),
                    Some(LedgerError::NotPaid(_)) => "Invoice has not been paid yet".to_string(),
                    Some(LedgerError::AlreadyWithdrawn(_)) => "Funds were already withdrawn".to_string(),
                    _ => format!("Withdrawal for invoice {invoice_id} failed"),
                };
                self.audit(
                    AuditEvent::new("withdrawal_failed", "rejected")
                        .with_invoice(invoice_id)
                        .with_actor(merchant)
                        .with_error(&e),
                );
                return Err(e.context(message));
            }
        };

        if let Err(e) = self.store.set_status(invoice_id, InvoiceStatus::Withdrawn, None) {
            tracing::warn!(invoice_id, error=%e, "failed to sync invoice status");
        }
        self.audit(
            AuditEvent::new("funds_withdrawn", InvoiceStatus::Withdrawn.as_str())
                .with_invoice(invoice_id)
                .with_actor(merchant)
                .with_amount(amount),
        );
        Ok(amount)
    }

    pub async fn withdraw_platform_fees(&self, owner: Address) -> Result<U256> {
        let amount = self
            .ledger
            .withdraw_platform_fees(Call::new(owner))
            .await
            .context("Failed to withdraw platform fees")?;
        self.audit(
            AuditEvent::new("platform_fees_withdrawn", "swept")
                .with_actor(owner)
                .with_amount(amount),
        );
        Ok(amount)
    }

    pub async fn transfer_ownership(&self, owner: Address, new_owner: Address) -> Result<()> {
        self.ledger
            .transfer_ownership(Call::new(owner), new_owner)
            .await
            .context("Failed to transfer ownership")?;
        tracing::info!(%owner, %new_owner, "ledger ownership transferred");
        self.audit(AuditEvent::new("ownership_transferred", "done").with_actor(new_owner));
        Ok(())
    }

    /// Leave the ledger without an owner. Platform fees can no longer be
    /// withdrawn afterwards.
    pub async fn renounce_ownership(&self, owner: Address) -> Result<()> {
        self.ledger
            .renounce_ownership(Call::new(owner))
            .await
            .context("Failed to renounce ownership")?;
        tracing::info!(%owner, "ledger ownership renounced");
        self.audit(AuditEvent::new("ownership_renounced", "done").with_actor(owner));
        Ok(())
    }

    pub async fn fee_report(&self) -> Result<FeeReport> {
        Ok(FeeReport {
            owner: self.ledger.owner().await?,
            accumulated_fees: self.ledger.accumulated_fees().await?,
            total_fees_collected: self.ledger.total_fees_collected().await?,
        })
    }

    /// Compose chain state, on-chain metadata and the stored document. On-chain
    /// metadata wins over the document; defaults fill whatever is missing.
    pub async fn invoice_view(&self, invoice_id: u64) -> Result<InvoiceView> {
        let invoice = self.ledger.get_invoice(invoice_id).await?;
        let payment = self.ledger.payment_info(invoice_id).await?;
        let meta = parse_metadata_uri(&invoice.metadata_uri);
        let doc = match self.store.get_invoice(invoice_id) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(invoice_id, error=%e, "invoice document unavailable");
                None
            }
        };

        let created_at = from_unix(invoice.created_at);
        let pick = |from_meta: Option<&str>, from_doc: Option<&str>, default: String| -> String {
            from_meta
                .filter(|s| !s.is_empty())
                .or(from_doc.filter(|s| !s.is_empty()))
                .map(str::to_string)
                .unwrap_or(default)
        };
        let m = meta.as_ref();
        let d = doc.as_ref();

        let fee = platform_fee(invoice.amount).ok_or_else(|| anyhow!("fee overflow"))?;
        let share = merchant_share(invoice.amount).ok_or_else(|| anyhow!("fee overflow"))?;
        let transaction_hash = self
            .creation_tx_hash(invoice_id)
            .await?
            .or_else(|| d.and_then(|d| d.transaction_hash.clone()));
        let payment_hash = payment
            .as_ref()
            .map(|p| p.tx_hash.clone())
            .or_else(|| d.and_then(|d| d.payment_hash.clone()));

        Ok(InvoiceView {
            id: invoice.id,
            title: pick(
                m.map(|m| m.title.as_str()),
                d.map(|d| d.title.as_str()),
                format!("Invoice #{}", invoice.id),
            ),
            billed_to: pick(
                m.map(|m| m.billed_to.as_str()),
                d.map(|d| d.billed_to.as_str()),
                "Unknown Client".to_string(),
            ),
            client_wallet: (!invoice.allowed_payer.is_zero()).then_some(invoice.allowed_payer),
            amount_wei: invoice.amount,
            amount: format_eth_amount(invoice.amount),
            platform_fee: format_eth_amount(fee),
            merchant_receives: format_eth_amount(share),
            due_date: pick(
                m.map(|m| m.due_date.as_str()),
                d.map(|d| d.due_date.as_str()),
                (created_at + Duration::days(DEFAULT_DUE_DAYS))
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            description: pick(
                m.map(|m| m.description.as_str()),
                d.map(|d| d.description.as_str()),
                "Payment required".to_string(),
            ),
            reference_number: m
                .and_then(|m| m.reference_number.clone())
                .or_else(|| d.and_then(|d| d.reference_number.clone())),
            email: m
                .and_then(|m| m.email.clone())
                .or_else(|| d.and_then(|d| d.email.clone())),
            tax_info: m
                .and_then(|m| m.tax_info.clone())
                .or_else(|| d.and_then(|d| d.tax_info.clone())),
            merchant_name: pick(
                m.and_then(|m| m.merchant_name.as_deref()),
                d.map(|d| d.merchant_name.as_str()),
                "Merchant".to_string(),
            ),
            merchant_wallet: invoice.merchant,
            status: InvoiceStatus::from_chain(invoice.is_paid, invoice.withdrawn),
            created_at,
            paid_at: invoice.is_paid.then(|| from_unix(invoice.paid_at)),
            paid_by: payment.map(|p| p.payer),
            transaction_hash,
            payment_hash,
        })
    }

    /// Every invoice `wallet` created or paid, in id order. Invoices that
    /// fail to load are skipped.
    pub async fn list_invoices(&self, wallet: Address) -> Result<Vec<InvoiceView>> {
        let current = self.ledger.get_current_invoice_id().await?;
        let mut out = Vec::new();
        for id in 1..=current {
            if !self.ledger.invoice_exists(id).await? {
                continue;
            }
            match self.invoice_view(id).await {
                Ok(view) if view.merchant_wallet == wallet || view.paid_by == Some(wallet) => out.push(view),
                Ok(_) => {}
                Err(e) => tracing::warn!(invoice_id = id, error=%e, "failed to load invoice"),
            }
        }
        Ok(out)
    }

    pub async fn earnings_summary(&self, merchant: Address) -> Result<EarningsSummary> {
        let mut summary = EarningsSummary::default();
        for view in self.list_invoices(merchant).await? {
            if view.merchant_wallet != merchant {
                continue;
            }
            summary.total_created += 1;
            if view.status == InvoiceStatus::Unpaid {
                summary.total_unpaid += 1;
                continue;
            }
            summary.total_paid += 1;
            let fee = platform_fee(view.amount_wei).ok_or_else(|| anyhow!("fee overflow"))?;
            let net = view.amount_wei - fee;
            summary.gross_received += view.amount_wei;
            summary.platform_fees += fee;
            if view.status == InvoiceStatus::Withdrawn {
                summary.withdrawn_net += net;
            } else {
                summary.pending_net += net;
            }
        }
        Ok(summary)
    }

    pub fn register_user(&self, wallet: Address, username: &str, email: Option<String>) -> Result<UserProfile> {
        let username = username.trim();
        validate_username(username).map_err(|errs| anyhow!("Invalid username: {}", errs.join("; ")))?;
        if self.store.is_username_taken(username, Some(wallet))? {
            bail!("Username '{username}' is already taken");
        }
        self.store.save_user(username, wallet, non_empty(email))
    }

    pub fn user(&self, wallet: Address) -> Result<Option<UserProfile>> {
        self.store.get_user(wallet)
    }

    pub fn notifications(&self, wallet: Address, unread_only: bool, limit: usize) -> Result<Vec<Notification>> {
        let wallet = wallet.to_string();
        if unread_only {
            self.store.unread_notifications(&wallet)
        } else {
            self.store.all_notifications(&wallet, limit)
        }
    }

    pub fn unread_count(&self, wallet: Address) -> Result<usize> {
        self.store.unread_notification_count(&wallet.to_string())
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<()> {
        self.store.mark_notification_read(id)
    }

    pub fn mark_all_notifications_read(&self, wallet: Address) -> Result<usize> {
        self.store.mark_all_notifications_read(&wallet.to_string())
    }

    async fn creation_tx_hash(&self, invoice_id: u64) -> Result<Option<String>> {
        let events = self.ledger.events_for_invoice(invoice_id).await?;
        Ok(events
            .into_iter()
            .find(|e| matches!(e.event, LedgerEvent::InvoiceCreated { .. }))
            .map(|e| e.tx_hash))
    }

    fn merchant_name(&self, merchant: Address) -> String {
        match self.store.get_user(merchant) {
            Ok(Some(profile)) => profile.username,
            Ok(None) => "Unknown".to_string(),
            Err(e) => {
                tracing::warn!(%merchant, error=%e, "user lookup failed");
                "Unknown".to_string()
            }
        }
    }

    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.audit().write(&event) {
            tracing::warn!(event_type=%event.event_type, error=%e, "failed to write audit event");
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn from_unix(secs: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs as i64, 0).unwrap_or_default()
}
