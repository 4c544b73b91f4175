use super::{wallet_key, Store};
use alloy_primitives::Address;
use anyhow::Result;
use automint_core::models::UserProfile;
use automint_core::validation::RESERVED_USERNAMES;
use chrono::Utc;

impl Store {
    /// Create or update the profile for `wallet`, keeping the original
    /// creation time on update.
    pub fn save_user(&self, username: &str, wallet: Address, email: Option<String>) -> Result<UserProfile> {
        let tree = self.users_tree()?;
        let key = user_key(wallet);
        let now = Utc::now();
        let created_at = match tree.get(key.as_bytes())? {
            Some(bytes) => serde_json::from_slice::<UserProfile>(&bytes)?.created_at,
            None => now,
        };
        let profile = UserProfile {
            username: username.to_string(),
            wallet_address: wallet,
            username_tag: format!("{username}.pay"),
            email,
            created_at,
            updated_at: now,
        };
        tree.insert(key.as_bytes(), serde_json::to_vec(&profile)?)?;
        tracing::info!(%username, %wallet, "user profile saved");
        Ok(profile)
    }

    pub fn get_user(&self, wallet: Address) -> Result<Option<UserProfile>> {
        let tree = self.users_tree()?;
        match tree.get(user_key(wallet).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let tree = self.users_tree()?;
        for item in tree.iter() {
            let (_k, v) = item?;
            let profile: UserProfile = serde_json::from_slice(&v)?;
            if profile.username.eq_ignore_ascii_case(username) {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    /// A name is taken if it is reserved or belongs to a wallet other than
    /// `requester`.
    pub fn is_username_taken(&self, username: &str, requester: Option<Address>) -> Result<bool> {
        let lowered = username.to_lowercase();
        if RESERVED_USERNAMES.contains(&lowered.as_str()) {
            return Ok(true);
        }
        Ok(match self.get_user_by_username(username)? {
            Some(profile) => Some(profile.wallet_address) != requester,
            None => false,
        })
    }
}

fn user_key(wallet: Address) -> String {
    wallet_key(&wallet.to_string())
}
