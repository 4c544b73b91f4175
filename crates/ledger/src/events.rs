use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    InvoiceCreated {
        invoice_id: u64,
        merchant: Address,
        amount: U256,
        metadata_uri: String,
        allowed_payer: Address,
    },
    InvoicePaid {
        invoice_id: u64,
        payer: Address,
        amount: U256,
        platform_fee: U256,
    },
    FundsWithdrawn {
        invoice_id: u64,
        merchant: Address,
        amount: U256,
    },
    PlatformFeesWithdrawn {
        owner: Address,
        amount: U256,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::InvoiceCreated { .. } => "InvoiceCreated",
            LedgerEvent::InvoicePaid { .. } => "InvoicePaid",
            LedgerEvent::FundsWithdrawn { .. } => "FundsWithdrawn",
            LedgerEvent::PlatformFeesWithdrawn { .. } => "PlatformFeesWithdrawn",
            LedgerEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    pub fn invoice_id(&self) -> Option<u64> {
        match self {
            LedgerEvent::InvoiceCreated { invoice_id, .. }
            | LedgerEvent::InvoicePaid { invoice_id, .. }
            | LedgerEvent::FundsWithdrawn { invoice_id, .. } => Some(*invoice_id),
            _ => None,
        }
    }
}

/// An event as recorded in the ledger's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub seq: u64,
    pub timestamp: u64,
    #[serde(default)]
    pub tx_hash: String,
    pub event: LedgerEvent,
}

/// Payment details recovered from an `InvoicePaid` log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub payer: Address,
    pub amount: U256,
    pub platform_fee: U256,
    pub timestamp: u64,
    pub tx_hash: String,
}
