use crate::error::LedgerError;
use crate::events::{LedgerEvent, LoggedEvent, PaymentInfo};
use crate::fee::{merchant_share, platform_fee};
use alloy_primitives::{Address, U256};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Execution context of a ledger call: who is calling, how much value is
/// attached, and the timestamp the call executes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub caller: Address,
    pub value: U256,
    pub timestamp: u64,
}

impl Call {
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::ZERO,
            timestamp: Utc::now().timestamp().max(0) as u64,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u64,
    pub merchant: Address,
    pub amount: U256,
    pub metadata_uri: String,
    pub allowed_payer: Address,
    pub is_paid: bool,
    pub created_at: u64,
    pub paid_at: u64,
    #[serde(default)]
    pub withdrawn: bool,
    #[serde(default)]
    pub withdrawn_at: u64,
}

impl Invoice {
    pub fn is_open_to(&self, payer: Address) -> bool {
        self.allowed_payer.is_zero() || self.allowed_payer == payer
    }
}

/// The invoice ledger: numbered invoices, escrowed payments, and the
/// platform fee accumulator, plus the account balances value moves between.
///
/// Every mutating method either applies all of its effects or returns an
/// error and leaves the ledger untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLedger {
    owner: Address,
    next_invoice_id: u64,
    invoices: BTreeMap<u64, Invoice>,
    accumulated_fees: U256,
    total_fees_collected: U256,
    escrow: U256,
    balances: BTreeMap<Address, U256>,
    events: Vec<LoggedEvent>,
}

impl InvoiceLedger {
    /// Deploy a fresh ledger owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            next_invoice_id: 1,
            invoices: BTreeMap::new(),
            accumulated_fees: U256::ZERO,
            total_fees_collected: U256::ZERO,
            escrow: U256::ZERO,
            balances: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn create_invoice(
        &mut self,
        call: &Call,
        amount: U256,
        metadata_uri: &str,
        allowed_payer: Address,
    ) -> Result<u64, LedgerError> {
        non_payable(call)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let invoice_id = self.next_invoice_id;
        let next = invoice_id.checked_add(1).ok_or(LedgerError::Overflow)?;

        self.invoices.insert(
            invoice_id,
            Invoice {
                id: invoice_id,
                merchant: call.caller,
                amount,
                metadata_uri: metadata_uri.to_string(),
                allowed_payer,
                is_paid: false,
                created_at: call.timestamp,
                paid_at: 0,
                withdrawn: false,
                withdrawn_at: 0,
            },
        );
        self.next_invoice_id = next;
        self.emit(
            call.timestamp,
            LedgerEvent::InvoiceCreated {
                invoice_id,
                merchant: call.caller,
                amount,
                metadata_uri: metadata_uri.to_string(),
                allowed_payer,
            },
        );
        Ok(invoice_id)
    }

    /// Settle `invoice_id` with the attached value. Returns the payment's
    /// transaction hash.
    pub fn pay_invoice(&mut self, call: &Call, invoice_id: u64) -> Result<String, LedgerError> {
        let invoice = self.get_invoice(invoice_id)?;
        if invoice.is_paid {
            return Err(LedgerError::AlreadyPaid(invoice_id));
        }
        if !invoice.is_open_to(call.caller) {
            return Err(LedgerError::UnauthorizedPayer {
                invoice_id,
                caller: call.caller,
            });
        }
        if call.value != invoice.amount {
            return Err(LedgerError::IncorrectPayment {
                expected: invoice.amount,
                sent: call.value,
            });
        }

        let amount = invoice.amount;
        let fee = platform_fee(amount).ok_or(LedgerError::Overflow)?;
        let available = self.balance_of(call.caller);
        let payer_balance = available
            .checked_sub(call.value)
            .ok_or(LedgerError::InsufficientBalance {
                account: call.caller,
                needed: call.value,
                available,
            })?;
        let escrow = self.escrow.checked_add(call.value).ok_or(LedgerError::Overflow)?;
        let accumulated = self.accumulated_fees.checked_add(fee).ok_or(LedgerError::Overflow)?;
        let total = self.total_fees_collected.checked_add(fee).ok_or(LedgerError::Overflow)?;

        self.balances.insert(call.caller, payer_balance);
        self.escrow = escrow;
        self.accumulated_fees = accumulated;
        self.total_fees_collected = total;
        if let Some(invoice) = self.invoices.get_mut(&invoice_id) {
            invoice.is_paid = true;
            invoice.paid_at = call.timestamp;
        }
        let tx_hash = self.emit(
            call.timestamp,
            LedgerEvent::InvoicePaid {
                invoice_id,
                payer: call.caller,
                amount,
                platform_fee: fee,
            },
        );
        Ok(tx_hash)
    }

    /// Release a paid invoice's net proceeds to its merchant. Returns the
    /// amount transferred.
    pub fn withdraw_invoice_funds(&mut self, call: &Call, invoice_id: u64) -> Result<U256, LedgerError> {
        non_payable(call)?;
        let invoice = self.get_invoice(invoice_id)?;
        if invoice.merchant != call.caller {
            return Err(LedgerError::NotMerchant(invoice_id));
        }
        if !invoice.is_paid {
            return Err(LedgerError::NotPaid(invoice_id));
        }
        if invoice.withdrawn {
            return Err(LedgerError::AlreadyWithdrawn(invoice_id));
        }

        let merchant = invoice.merchant;
        let payout = merchant_share(invoice.amount).ok_or(LedgerError::Overflow)?;
        let escrow = self.escrow.checked_sub(payout).ok_or(LedgerError::Overflow)?;
        let merchant_balance = self
            .balance_of(merchant)
            .checked_add(payout)
            .ok_or(LedgerError::Overflow)?;

        // Mark withdrawn before value leaves escrow.
        if let Some(invoice) = self.invoices.get_mut(&invoice_id) {
            invoice.withdrawn = true;
            invoice.withdrawn_at = call.timestamp;
        }
        self.escrow = escrow;
        self.balances.insert(merchant, merchant_balance);
        self.emit(
            call.timestamp,
            LedgerEvent::FundsWithdrawn {
                invoice_id,
                merchant,
                amount: payout,
            },
        );
        Ok(payout)
    }

    /// Sweep accrued platform fees to the owner. Returns the amount swept.
    pub fn withdraw_platform_fees(&mut self, call: &Call) -> Result<U256, LedgerError> {
        non_payable(call)?;
        self.only_owner(call)?;
        let amount = self.accumulated_fees;
        if amount.is_zero() {
            return Err(LedgerError::NoFeesToWithdraw);
        }
        let escrow = self.escrow.checked_sub(amount).ok_or(LedgerError::Overflow)?;
        let owner_balance = self
            .balance_of(self.owner)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.accumulated_fees = U256::ZERO;
        self.escrow = escrow;
        self.balances.insert(self.owner, owner_balance);
        self.emit(
            call.timestamp,
            LedgerEvent::PlatformFeesWithdrawn {
                owner: self.owner,
                amount,
            },
        );
        Ok(amount)
    }

    pub fn transfer_ownership(&mut self, call: &Call, new_owner: Address) -> Result<(), LedgerError> {
        non_payable(call)?;
        self.only_owner(call)?;
        if new_owner.is_zero() {
            return Err(LedgerError::InvalidOwner(new_owner));
        }
        self.set_owner(call.timestamp, new_owner);
        Ok(())
    }

    pub fn renounce_ownership(&mut self, call: &Call) -> Result<(), LedgerError> {
        non_payable(call)?;
        self.only_owner(call)?;
        self.set_owner(call.timestamp, Address::ZERO);
        Ok(())
    }

    /// Credit `account` with `value` wei from outside the ledger.
    pub fn deposit(&mut self, account: Address, value: U256) -> Result<U256, LedgerError> {
        let balance = self
            .balance_of(account)
            .checked_add(value)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(account, balance);
        Ok(balance)
    }

    pub fn get_invoice(&self, invoice_id: u64) -> Result<&Invoice, LedgerError> {
        self.invoices
            .get(&invoice_id)
            .ok_or(LedgerError::InvoiceNotFound(invoice_id))
    }

    pub fn invoice_exists(&self, invoice_id: u64) -> bool {
        self.invoices.contains_key(&invoice_id)
    }

    /// Id of the most recently created invoice, 0 before the first one.
    pub fn get_current_invoice_id(&self) -> u64 {
        self.next_invoice_id.saturating_sub(1)
    }

    pub fn next_invoice_id(&self) -> u64 {
        self.next_invoice_id
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn accumulated_fees(&self) -> U256 {
        self.accumulated_fees
    }

    pub fn total_fees_collected(&self) -> U256 {
        self.total_fees_collected
    }

    pub fn escrow(&self) -> U256 {
        self.escrow
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    pub fn events_for_invoice(&self, invoice_id: u64) -> impl Iterator<Item = &LoggedEvent> {
        self.events
            .iter()
            .filter(move |e| e.event.invoice_id() == Some(invoice_id))
    }

    pub fn payment_info(&self, invoice_id: u64) -> Option<PaymentInfo> {
        self.events_for_invoice(invoice_id).find_map(|logged| match &logged.event {
            LedgerEvent::InvoicePaid {
                payer,
                amount,
                platform_fee,
                ..
            } => Some(PaymentInfo {
                payer: *payer,
                amount: *amount,
                platform_fee: *platform_fee,
                timestamp: logged.timestamp,
                tx_hash: logged.tx_hash.clone(),
            }),
            _ => None,
        })
    }

    fn only_owner(&self, call: &Call) -> Result<(), LedgerError> {
        if call.caller != self.owner {
            return Err(LedgerError::Unauthorized(call.caller));
        }
        Ok(())
    }

    fn set_owner(&mut self, timestamp: u64, new_owner: Address) {
        let previous_owner = self.owner;
        self.owner = new_owner;
        self.emit(
            timestamp,
            LedgerEvent::OwnershipTransferred {
                previous_owner,
                new_owner,
            },
        );
    }

    /// Append `event` to the log and return its transaction hash.
    fn emit(&mut self, timestamp: u64, event: LedgerEvent) -> String {
        let seq = self.events.len() as u64;
        let tx_hash = compute_tx_hash(seq, timestamp, &event);
        tracing::debug!(seq, event = event.name(), invoice_id = ?event.invoice_id(), %tx_hash, "ledger event");
        self.events.push(LoggedEvent {
            seq,
            timestamp,
            tx_hash: tx_hash.clone(),
            event,
        });
        tx_hash
    }
}

/// SHA-256 over the log position and the event payload, `0x`-prefixed.
fn compute_tx_hash(seq: u64, timestamp: u64, event: &LedgerEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    hasher.update(format!("{event:?}").as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn non_payable(call: &Call) -> Result<(), LedgerError> {
    if call.value.is_zero() {
        Ok(())
    } else {
        Err(LedgerError::NonPayable)
    }
}
