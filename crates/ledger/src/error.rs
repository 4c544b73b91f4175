use alloy_primitives::{Address, U256};

/// Reasons a ledger call is rejected. A rejected call leaves no trace in the
/// ledger state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("function is not payable")]
    NonPayable,

    #[error("invoice {0} does not exist")]
    InvoiceNotFound(u64),

    #[error("invoice {0} is already paid")]
    AlreadyPaid(u64),

    #[error("{caller} is not allowed to pay invoice {invoice_id}")]
    UnauthorizedPayer { invoice_id: u64, caller: Address },

    #[error("incorrect payment amount: expected {expected} wei, got {sent} wei")]
    IncorrectPayment { expected: U256, sent: U256 },

    #[error("insufficient balance for {account}: needs {needed} wei, has {available} wei")]
    InsufficientBalance {
        account: Address,
        needed: U256,
        available: U256,
    },

    #[error("only the merchant can withdraw invoice {0}")]
    NotMerchant(u64),

    #[error("invoice {0} has not been paid")]
    NotPaid(u64),

    #[error("funds for invoice {0} were already withdrawn")]
    AlreadyWithdrawn(u64),

    #[error("account {0} is not the owner")]
    Unauthorized(Address),

    #[error("invalid owner {0}")]
    InvalidOwner(Address),

    #[error("no platform fees to withdraw")]
    NoFeesToWithdraw,

    #[error("arithmetic overflow")]
    Overflow,
}
