use super::{wallet_key, Store};
use anyhow::{anyhow, Result};
use automint_core::models::Notification;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

pub const DEFAULT_NOTIFICATION_LIMIT: usize = 20;

impl Store {
    /// Record a notification addressed to `to_wallet`. Returns its id.
    pub fn send_notification(
        &self,
        to_wallet: &str,
        invoice_id: u64,
        title: &str,
        message: &str,
        merchant_name: Option<&str>,
        amount: Option<&str>,
    ) -> Result<String> {
        let notification = Notification {
            id: generate_notification_id(),
            wallet: wallet_key(to_wallet),
            invoice_id,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            timestamp: Utc::now(),
            merchant_name: merchant_name.unwrap_or("Unknown Merchant").to_string(),
            amount: amount.unwrap_or("0").to_string(),
        };
        self.put_notification(&notification)?;
        tracing::info!(id=%notification.id, wallet=%notification.wallet, invoice_id, "notification sent");
        Ok(notification.id)
    }

    pub fn put_notification(&self, notification: &Notification) -> Result<()> {
        let tree = self.notifications_tree()?;
        tree.insert(notification.id.as_bytes(), serde_json::to_vec(notification)?)?;
        Ok(())
    }

    /// Unread notifications for `wallet`, newest first.
    pub fn unread_notifications(&self, wallet: &str) -> Result<Vec<Notification>> {
        Ok(self
            .notifications_for(wallet)?
            .into_iter()
            .filter(|n| !n.read)
            .collect())
    }

    /// Up to `limit` notifications for `wallet`, newest first.
    pub fn all_notifications(&self, wallet: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut out = self.notifications_for(wallet)?;
        out.truncate(limit);
        Ok(out)
    }

    pub fn unread_notification_count(&self, wallet: &str) -> Result<usize> {
        Ok(self.unread_notifications(wallet)?.len())
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<()> {
        let tree = self.notifications_tree()?;
        let existing = tree
            .get(id.as_bytes())?
            .ok_or_else(|| anyhow!("notification not found: {id}"))?;
        let mut notification: Notification = serde_json::from_slice(&existing)?;
        notification.read = true;
        tree.insert(id.as_bytes(), serde_json::to_vec(&notification)?)?;
        Ok(())
    }

    /// Returns how many notifications were marked.
    pub fn mark_all_notifications_read(&self, wallet: &str) -> Result<usize> {
        let unread = self.unread_notifications(wallet)?;
        for notification in &unread {
            self.mark_notification_read(&notification.id)?;
        }
        Ok(unread.len())
    }

    fn notifications_for(&self, wallet: &str) -> Result<Vec<Notification>> {
        let wallet = wallet_key(wallet);
        let tree = self.notifications_tree()?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_k, v) = item?;
            let notification: Notification = serde_json::from_slice(&v)?;
            if notification.wallet == wallet {
                out.push(notification);
            }
        }
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }
}

fn generate_notification_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const WALLET: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";

    fn stamped(id: &str, wallet: &str, minutes_ago: i64, read: bool) -> Notification {
        Notification {
            id: id.into(),
            wallet: wallet_key(wallet),
            invoice_id: 1,
            title: "New Invoice Received".into(),
            message: "You have received an invoice".into(),
            read,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            merchant_name: "alice".into(),
            amount: "1".into(),
        }
    }

    #[test]
    fn send_applies_defaults_and_lowercases_wallet() {
        let store = Store::temporary().unwrap();
        let id = store
            .send_notification(WALLET, 4, "New Invoice Received", "hi", None, None)
            .unwrap();
        assert_eq!(id.len(), 20);

        let all = store.all_notifications(&WALLET.to_lowercase(), 20).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].wallet, WALLET.to_lowercase());
        assert_eq!(all[0].merchant_name, "Unknown Merchant");
        assert_eq!(all[0].amount, "0");
        assert!(!all[0].read);
    }

    #[test]
    fn queries_are_newest_first_and_scoped() {
        let store = Store::temporary().unwrap();
        store.put_notification(&stamped("old", WALLET, 30, false)).unwrap();
        store.put_notification(&stamped("new", WALLET, 1, false)).unwrap();
        store.put_notification(&stamped("seen", WALLET, 10, true)).unwrap();
        store
            .put_notification(&stamped("other", "0x0000000000000000000000000000000000000001", 0, false))
            .unwrap();

        let unread: Vec<_> = store
            .unread_notifications(WALLET)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(unread, ["new", "old"]);

        let all: Vec<_> = store
            .all_notifications(WALLET, 2)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(all, ["new", "seen"]);
    }

    #[test]
    fn marking_read() {
        let store = Store::temporary().unwrap();
        store.put_notification(&stamped("a", WALLET, 3, false)).unwrap();
        store.put_notification(&stamped("b", WALLET, 2, false)).unwrap();
        store.put_notification(&stamped("c", WALLET, 1, false)).unwrap();

        store.mark_notification_read("b").unwrap();
        assert_eq!(store.unread_notification_count(WALLET).unwrap(), 2);
        assert_eq!(store.mark_all_notifications_read(WALLET).unwrap(), 2);
        assert_eq!(store.unread_notification_count(WALLET).unwrap(), 0);
        assert!(store.mark_notification_read("missing").is_err());
    }
}
