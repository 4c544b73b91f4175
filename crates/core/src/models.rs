use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const METADATA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Withdrawn,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn from_chain(is_paid: bool, withdrawn: bool) -> Self {
        match (is_paid, withdrawn) {
            (true, true) => InvoiceStatus::Withdrawn,
            (true, false) => InvoiceStatus::Paid,
            _ => InvoiceStatus::Unpaid,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried in an invoice's metadata URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub billed_to: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(default = "default_metadata_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_metadata_version() -> String {
    METADATA_VERSION.to_string()
}

/// Form input for a new invoice, amounts still in decimal ETH.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub title: String,
    pub billed_to: String,
    pub client_wallet: Option<String>,
    pub amount: String,
    pub due_date: String,
    pub description: String,
    pub reference_number: Option<String>,
    pub email: Option<String>,
    pub tax_info: Option<String>,
}

/// Off-chain record stored next to an on-chain invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub invoice_id: u64,
    pub title: String,
    pub billed_to: String,
    pub client_wallet: Option<Address>,
    pub amount: String,
    pub due_date: String,
    pub description: String,
    pub reference_number: Option<String>,
    pub email: Option<String>,
    pub tax_info: Option<String>,
    pub merchant_name: String,
    pub merchant_wallet: Address,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Address>,
    pub metadata_hash: String,
    /// Hash of the transaction that created the invoice.
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub wallet: String,
    pub invoice_id: u64,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub timestamp: DateTime<Utc>,
    pub merchant_name: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub wallet_address: Address,
    pub username_tag: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An invoice as shown to a wallet: chain state merged with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceView {
    pub id: u64,
    pub title: String,
    pub billed_to: String,
    pub client_wallet: Option<Address>,
    pub amount_wei: U256,
    pub amount: String,
    pub platform_fee: String,
    pub merchant_receives: String,
    pub due_date: String,
    pub description: String,
    pub reference_number: Option<String>,
    pub email: Option<String>,
    pub tax_info: Option<String>,
    pub merchant_name: String,
    pub merchant_wallet: Address,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<Address>,
    pub transaction_hash: Option<String>,
    pub payment_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_chain_flags() {
        assert_eq!(InvoiceStatus::from_chain(false, false), InvoiceStatus::Unpaid);
        assert_eq!(InvoiceStatus::from_chain(true, false), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_chain(true, true), InvoiceStatus::Withdrawn);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let meta = InvoiceMetadata {
            title: "Design work".into(),
            description: "Logo".into(),
            billed_to: "Acme".into(),
            due_date: "2026-11-01".into(),
            reference_number: Some("REF-7".into()),
            email: None,
            tax_info: None,
            merchant_name: None,
            version: METADATA_VERSION.into(),
            created_at: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["billedTo"], "Acme");
        assert_eq!(json["referenceNumber"], "REF-7");
        assert!(json.get("email").is_none());
    }
}
