mod audit;
mod notifications;
mod users;

pub use audit::{AuditEvent, AuditLog};
pub use notifications::DEFAULT_NOTIFICATION_LIMIT;

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use automint_core::models::{InvoiceDocument, InvoiceStatus};
use chrono::Utc;
use ledger::{local::SnapshotSink, InvoiceLedger};
use sled::Db;
use std::path::Path;

const LEDGER_STATE_KEY: &[u8] = b"state";

/// Document store backing invoice metadata, notifications, user profiles and
/// the persisted ledger state.
#[derive(Clone)]
pub struct Store {
    db: Db,
    audit: AuditLog,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("Failed to open store at {}", path.display()))?;
        Ok(Self {
            db,
            audit: AuditLog::new(path.join("audit.jsonl")),
        })
    }

    /// In-memory store removed on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            audit: AuditLog::disabled(),
        })
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn invoices_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("invoices")?)
    }

    fn notifications_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("notifications")?)
    }

    fn users_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("users")?)
    }

    fn ledger_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("ledger")?)
    }

    pub fn put_invoice(&self, doc: &InvoiceDocument) -> Result<()> {
        let invoices = self.invoices_tree()?;
        invoices.insert(doc.invoice_id.to_be_bytes(), serde_json::to_vec(doc)?)?;
        tracing::debug!(invoice_id = doc.invoice_id, "invoice document stored");
        Ok(())
    }

    pub fn get_invoice(&self, invoice_id: u64) -> Result<Option<InvoiceDocument>> {
        let invoices = self.invoices_tree()?;
        match invoices.get(invoice_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Sync the document's status with the chain. `paid_by` is recorded the
    /// first time it is known.
    pub fn set_status(&self, invoice_id: u64, status: InvoiceStatus, paid_by: Option<Address>) -> Result<()> {
        let invoices = self.invoices_tree()?;
        update_doc(&invoices, invoice_id, |doc| {
            doc.status = status;
            if status != InvoiceStatus::Unpaid && doc.paid_at.is_none() {
                doc.paid_at = Some(Utc::now());
            }
            if doc.paid_by.is_none() {
                doc.paid_by = paid_by;
            }
        })
    }

    pub fn set_payment_hash(&self, invoice_id: u64, payment_hash: &str) -> Result<()> {
        let invoices = self.invoices_tree()?;
        update_doc(&invoices, invoice_id, |doc| {
            doc.payment_hash = Some(payment_hash.to_string());
        })
    }

    pub fn list_invoices_by_merchant(&self, merchant: Address) -> Result<Vec<InvoiceDocument>> {
        let invoices = self.invoices_tree()?;
        let mut out = Vec::new();
        for item in invoices.iter() {
            let (_k, v) = item?;
            let doc: InvoiceDocument = serde_json::from_slice(&v)?;
            if doc.merchant_wallet == merchant {
                out.push(doc);
            }
        }
        Ok(out)
    }

    pub fn load_ledger(&self) -> Result<Option<InvoiceLedger>> {
        let tree = self.ledger_tree()?;
        match tree.get(LEDGER_STATE_KEY)? {
            Some(bytes) => {
                let ledger = serde_json::from_slice(&bytes).context("Corrupt ledger snapshot")?;
                Ok(Some(ledger))
            }
            None => Ok(None),
        }
    }

    pub fn save_ledger(&self, ledger: &InvoiceLedger) -> Result<()> {
        let tree = self.ledger_tree()?;
        tree.insert(LEDGER_STATE_KEY, serde_json::to_vec(ledger)?)?;
        tree.flush()?;
        Ok(())
    }
}

impl SnapshotSink for Store {
    fn save(&self, ledger: &InvoiceLedger) -> Result<()> {
        self.save_ledger(ledger)
    }
}

fn update_doc<F>(tree: &sled::Tree, invoice_id: u64, mut f: F) -> Result<()>
where
    F: FnMut(&mut InvoiceDocument),
{
    let key = invoice_id.to_be_bytes();
    let existing = tree
        .get(key)?
        .ok_or_else(|| anyhow!("invoice document not found: {invoice_id}"))?;
    let mut doc: InvoiceDocument = serde_json::from_slice(&existing)?;
    f(&mut doc);
    tree.insert(key, serde_json::to_vec(&doc)?)?;
    Ok(())
}

pub(crate) fn wallet_key(wallet: &str) -> String {
    wallet.trim().to_lowercase()
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use alloy_primitives::U256;
    use ledger::Call;

    #[test]
    fn invoice_documents_round_trip() {
        let store = Store::temporary().unwrap();
        store.put_invoice(&doc(1, MERCHANT)).unwrap();
        store.put_invoice(&doc(2, CLIENT)).unwrap();

        let loaded = store.get_invoice(1).unwrap().unwrap();
        assert_eq!(loaded.title, "Invoice 1");
        assert!(store.get_invoice(3).unwrap().is_none());

        let mine = store.list_invoices_by_merchant(MERCHANT).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].invoice_id, 1);
    }

    #[test]
    fn status_sync_records_payer_once() {
        let store = Store::temporary().unwrap();
        store.put_invoice(&doc(1, MERCHANT)).unwrap();

        store.set_status(1, InvoiceStatus::Paid, Some(CLIENT)).unwrap();
        store.set_status(1, InvoiceStatus::Withdrawn, None).unwrap();

        let loaded = store.get_invoice(1).unwrap().unwrap();
        assert_eq!(loaded.status, InvoiceStatus::Withdrawn);
        assert_eq!(loaded.paid_by, Some(CLIENT));
        assert!(loaded.paid_at.is_some());

        assert!(store.set_status(9, InvoiceStatus::Paid, None).is_err());
    }

    #[test]
    fn payment_hash_is_recorded_on_the_document() {
        let store = Store::temporary().unwrap();
        store.put_invoice(&doc(1, MERCHANT)).unwrap();
        assert!(store.get_invoice(1).unwrap().unwrap().payment_hash.is_none());

        store.set_payment_hash(1, "0xabc").unwrap();
        assert_eq!(store.get_invoice(1).unwrap().unwrap().payment_hash.as_deref(), Some("0xabc"));
        assert!(store.set_payment_hash(2, "0xabc").is_err());
    }

    #[test]
    fn ledger_snapshot_persists() {
        let store = Store::temporary().unwrap();
        assert!(store.load_ledger().unwrap().is_none());

        let mut ledger = InvoiceLedger::new(MERCHANT);
        ledger
            .create_invoice(&Call::new(MERCHANT), U256::from(10u64), "{}", Address::ZERO)
            .unwrap();
        store.save(&ledger).unwrap();

        let restored = store.load_ledger().unwrap().unwrap();
        assert_eq!(restored.get_current_invoice_id(), 1);
        assert_eq!(restored.owner(), MERCHANT);
    }
}
