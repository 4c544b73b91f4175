use super::{Call, Invoice, InvoiceLedger, LedgerClient, LoggedEvent, PaymentInfo};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persists ledger state after each accepted call.
pub trait SnapshotSink: Send + Sync {
    fn save(&self, ledger: &InvoiceLedger) -> Result<()>;
}

/// In-process ledger. Calls are applied one at a time in arrival order; a
/// call only takes effect once its resulting state has been handed to the
/// snapshot sink.
pub struct LocalLedgerClient {
    ledger: Mutex<InvoiceLedger>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl LocalLedgerClient {
    pub fn new(ledger: InvoiceLedger) -> Arc<Self> {
        Arc::new(Self {
            ledger: Mutex::new(ledger),
            sink: None,
        })
    }

    pub fn with_sink(ledger: InvoiceLedger, sink: Arc<dyn SnapshotSink>) -> Arc<Self> {
        Arc::new(Self {
            ledger: Mutex::new(ledger),
            sink: Some(sink),
        })
    }

    async fn transact<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut InvoiceLedger) -> Result<T, crate::LedgerError>,
    {
        let mut current = self.ledger.lock().await;
        let mut next = current.clone();
        let out = match f(&mut next) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(op, error=%e, "ledger call reverted");
                return Err(e.into());
            }
        };
        if let Some(sink) = &self.sink {
            sink.save(&next)?;
        }
        *current = next;
        Ok(out)
    }

    async fn view<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&InvoiceLedger) -> T,
    {
        let ledger = self.ledger.lock().await;
        f(&ledger)
    }
}

#[async_trait]
impl LedgerClient for LocalLedgerClient {
    async fn create_invoice(
        &self,
        call: Call,
        amount: U256,
        metadata_uri: &str,
        allowed_payer: Address,
    ) -> Result<u64> {
        let id = self
            .transact("create_invoice", |l| {
                l.create_invoice(&call, amount, metadata_uri, allowed_payer)
            })
            .await?;
        tracing::info!(invoice_id = id, merchant=%call.caller, %amount, "invoice created");
        Ok(id)
    }

    async fn pay_invoice(&self, call: Call, invoice_id: u64) -> Result<String> {
        let tx_hash = self
            .transact("pay_invoice", |l| l.pay_invoice(&call, invoice_id))
            .await?;
        tracing::info!(invoice_id, payer=%call.caller, value=%call.value, %tx_hash, "invoice paid");
        Ok(tx_hash)
    }

    async fn withdraw_invoice_funds(&self, call: Call, invoice_id: u64) -> Result<U256> {
        let amount = self
            .transact("withdraw_invoice_funds", |l| {
                l.withdraw_invoice_funds(&call, invoice_id)
            })
            .await?;
        tracing::info!(invoice_id, merchant=%call.caller, %amount, "invoice funds withdrawn");
        Ok(amount)
    }

    async fn withdraw_platform_fees(&self, call: Call) -> Result<U256> {
        let amount = self
            .transact("withdraw_platform_fees", |l| l.withdraw_platform_fees(&call))
            .await?;
        tracing::info!(owner=%call.caller, %amount, "platform fees withdrawn");
        Ok(amount)
    }

    async fn transfer_ownership(&self, call: Call, new_owner: Address) -> Result<()> {
        self.transact("transfer_ownership", |l| l.transfer_ownership(&call, new_owner))
            .await
    }

    async fn renounce_ownership(&self, call: Call) -> Result<()> {
        self.transact("renounce_ownership", |l| l.renounce_ownership(&call))
            .await
    }

    async fn deposit(&self, account: Address, value: U256) -> Result<U256> {
        self.transact("deposit", |l| l.deposit(account, value)).await
    }

    async fn get_invoice(&self, invoice_id: u64) -> Result<Invoice> {
        Ok(self.view(|l| l.get_invoice(invoice_id).cloned()).await?)
    }

    async fn invoice_exists(&self, invoice_id: u64) -> Result<bool> {
        Ok(self.view(|l| l.invoice_exists(invoice_id)).await)
    }

    async fn get_current_invoice_id(&self) -> Result<u64> {
        Ok(self.view(|l| l.get_current_invoice_id()).await)
    }

    async fn owner(&self) -> Result<Address> {
        Ok(self.view(|l| l.owner()).await)
    }

    async fn accumulated_fees(&self) -> Result<U256> {
        Ok(self.view(|l| l.accumulated_fees()).await)
    }

    async fn total_fees_collected(&self) -> Result<U256> {
        Ok(self.view(|l| l.total_fees_collected()).await)
    }

    async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self.view(|l| l.balance_of(account)).await)
    }

    async fn events_for_invoice(&self, invoice_id: u64) -> Result<Vec<LoggedEvent>> {
        Ok(self
            .view(|l| l.events_for_invoice(invoice_id).cloned().collect())
            .await)
    }

    async fn payment_info(&self, invoice_id: u64) -> Result<Option<PaymentInfo>> {
        Ok(self.view(|l| l.payment_info(invoice_id)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rejection, LedgerError};
    use alloy_primitives::address;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const OWNER: Address = address!("0x0000000000000000000000000000000000000001");
    const MERCHANT: Address = address!("0x0000000000000000000000000000000000000002");
    const PAYER: Address = address!("0x0000000000000000000000000000000000000003");

    #[derive(Default)]
    struct CountingSink {
        saves: AtomicUsize,
        fail: AtomicBool,
    }

    impl SnapshotSink for CountingSink {
        fn save(&self, _ledger: &InvoiceLedger) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn rejections_are_typed() {
        let client = LocalLedgerClient::new(InvoiceLedger::new(OWNER));
        let err = client
            .create_invoice(Call::new(MERCHANT), U256::ZERO, "", Address::ZERO)
            .await
            .unwrap_err();
        assert_eq!(rejection(&err), Some(&LedgerError::InvalidAmount));
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let client = LocalLedgerClient::new(InvoiceLedger::new(OWNER));
        client.deposit(PAYER, U256::from(50_000u64)).await.unwrap();

        let id = client
            .create_invoice(Call::new(MERCHANT), U256::from(20_000u64), "{}", PAYER)
            .await
            .unwrap();
        client
            .pay_invoice(Call::new(PAYER).with_value(U256::from(20_000u64)), id)
            .await
            .unwrap();
        let net = client
            .withdraw_invoice_funds(Call::new(MERCHANT), id)
            .await
            .unwrap();
        let fees = client.withdraw_platform_fees(Call::new(OWNER)).await.unwrap();

        assert_eq!(net, U256::from(19_800u64));
        assert_eq!(fees, U256::from(200u64));
        assert_eq!(client.balance_of(PAYER).await.unwrap(), U256::from(30_000u64));
        assert_eq!(client.balance_of(MERCHANT).await.unwrap(), net);
        assert_eq!(client.total_fees_collected().await.unwrap(), fees);
        assert!(client.get_invoice(id).await.unwrap().withdrawn);
        assert_eq!(client.events_for_invoice(id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_snapshot_reverts_the_call() {
        let sink = Arc::new(CountingSink::default());
        let client = LocalLedgerClient::with_sink(InvoiceLedger::new(OWNER), sink.clone());

        client
            .create_invoice(Call::new(MERCHANT), U256::from(1u64), "{}", Address::ZERO)
            .await
            .unwrap();
        assert_eq!(sink.saves.load(Ordering::SeqCst), 1);

        sink.fail.store(true, Ordering::SeqCst);
        assert!(client
            .create_invoice(Call::new(MERCHANT), U256::from(1u64), "{}", Address::ZERO)
            .await
            .is_err());
        assert_eq!(client.get_current_invoice_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_payments_settle_once() {
        let client = LocalLedgerClient::new(InvoiceLedger::new(OWNER));
        let id = client
            .create_invoice(Call::new(MERCHANT), U256::from(1_000u64), "{}", Address::ZERO)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for n in 10..20u64 {
            let payer = Address::with_last_byte(n as u8);
            client.deposit(payer, U256::from(1_000u64)).await.unwrap();
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                client
                    .pay_invoice(Call::new(payer).with_value(U256::from(1_000u64)), id)
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert_eq!(rejection(&e), Some(&LedgerError::AlreadyPaid(id))),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(client.accumulated_fees().await.unwrap(), U256::from(10u64));
    }

    #[tokio::test]
    async fn renounce_leaves_no_owner() {
        let client = LocalLedgerClient::new(InvoiceLedger::new(OWNER));
        let err = client.renounce_ownership(Call::new(MERCHANT)).await.unwrap_err();
        assert_eq!(rejection(&err), Some(&LedgerError::Unauthorized(MERCHANT)));

        client.renounce_ownership(Call::new(OWNER)).await.unwrap();
        assert_eq!(client.owner().await.unwrap(), Address::ZERO);
        let err = client.renounce_ownership(Call::new(OWNER)).await.unwrap_err();
        assert_eq!(rejection(&err), Some(&LedgerError::Unauthorized(OWNER)));
    }
}
