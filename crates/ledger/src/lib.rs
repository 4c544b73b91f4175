use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;

pub mod error;
pub mod events;
pub mod fee;
pub mod ledger;
pub mod local;

pub use error::LedgerError;
pub use events::{LedgerEvent, LoggedEvent, PaymentInfo};
pub use fee::{merchant_share, platform_fee, BASIS_POINTS, PLATFORM_FEE_BPS};
pub use ledger::{Call, Invoice, InvoiceLedger};

/// Access to an invoice ledger. Rejections surface as [`LedgerError`] inside
/// the returned `anyhow::Error`.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn create_invoice(
        &self,
        call: Call,
        amount: U256,
        metadata_uri: &str,
        allowed_payer: Address,
    ) -> Result<u64>;
    /// Returns the payment's transaction hash.
    async fn pay_invoice(&self, call: Call, invoice_id: u64) -> Result<String>;
    async fn withdraw_invoice_funds(&self, call: Call, invoice_id: u64) -> Result<U256>;
    async fn withdraw_platform_fees(&self, call: Call) -> Result<U256>;
    async fn transfer_ownership(&self, call: Call, new_owner: Address) -> Result<()>;
    async fn renounce_ownership(&self, call: Call) -> Result<()>;
    async fn deposit(&self, account: Address, value: U256) -> Result<U256>;

    async fn get_invoice(&self, invoice_id: u64) -> Result<Invoice>;
    async fn invoice_exists(&self, invoice_id: u64) -> Result<bool>;
    async fn get_current_invoice_id(&self) -> Result<u64>;
    async fn owner(&self) -> Result<Address>;
    async fn accumulated_fees(&self) -> Result<U256>;
    async fn total_fees_collected(&self) -> Result<U256>;
    async fn balance_of(&self, account: Address) -> Result<U256>;
    async fn events_for_invoice(&self, invoice_id: u64) -> Result<Vec<LoggedEvent>>;
    async fn payment_info(&self, invoice_id: u64) -> Result<Option<PaymentInfo>>;
}

/// Returns the ledger rejection behind `err`, if that is what it is.
pub fn rejection(err: &anyhow::Error) -> Option<&LedgerError> {
    err.downcast_ref::<LedgerError>()
}
