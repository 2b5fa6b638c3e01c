use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, AccountStore, NewAccount, StoreError, StoreResult};

/// In-process account store for tests and local runs (`--dsn memory://`).
///
/// Every mutation happens under a single write lock, which gives the same
/// compare-and-swap guarantees as the conditional updates in Postgres.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Duplicate);
        }

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4(),
            email: account.email,
            username: account.username,
            password_hash: account.password_hash,
            verified: false,
            verification_token_hash: Some(account.verification_token_hash),
            verification_token_expiry: Some(account.verification_token_expiry),
            created_at: now,
            updated_at: now,
        };
        accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|a| a.id != account.id && a.email == account.email)
        {
            return Err(StoreError::Duplicate);
        }
        match accounts.get_mut(&account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "account {} not found",
                account.id
            ))),
        }
    }

    async fn consume_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts
            .values_mut()
            .find(|a| !a.verified && a.token_matches(token_hash, now))
        else {
            return Ok(None);
        };

        account.mark_verified(now);
        Ok(Some(account.clone()))
    }

    async fn reissue_verification_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expiry: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut accounts = self.accounts.write().await;
        Ok(accounts.get_mut(&id).is_some_and(|account| {
            account.replace_verification_token(token_hash.to_string(), expiry, Utc::now())
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(email: &str, token_hash: &str, expiry: DateTime<Utc>) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            verification_token_hash: token_hash.to_string(),
            verification_token_expiry: expiry,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let expiry = Utc::now() + Duration::hours(1);
        store.create(new_account("a@x.com", "t1", expiry)).await?;

        let second = store.create(new_account("a@x.com", "t2", expiry)).await;
        assert!(matches!(second, Err(StoreError::Duplicate)));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn email_lookup_is_case_sensitive() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let expiry = Utc::now() + Duration::hours(1);
        store.create(new_account("a@x.com", "t1", expiry)).await?;

        assert!(store.find_by_email("a@x.com").await?.is_some());
        assert!(store.find_by_email("A@X.com").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn consume_is_single_use() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        store
            .create(new_account("a@x.com", "t1", now + Duration::hours(1)))
            .await?;

        let verified = store.consume_verification_token("t1", now).await?;
        assert!(verified.as_ref().is_some_and(|a| a.verified));
        assert!(store.consume_verification_token("t1", now).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn consume_rejects_expired_token() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        store
            .create(new_account("a@x.com", "t1", now - Duration::seconds(1)))
            .await?;

        assert!(store.consume_verification_token("t1", now).await?.is_none());
        let account = store.find_by_email("a@x.com").await?;
        assert!(account.is_some_and(|a| !a.verified));
        Ok(())
    }

    #[tokio::test]
    async fn reissue_only_touches_unverified_accounts() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        let created = store
            .create(new_account("a@x.com", "t1", now + Duration::hours(1)))
            .await?;

        assert!(
            store
                .reissue_verification_token(created.id, "t2", now + Duration::hours(2))
                .await?
        );
        let account = store.find_by_id(created.id).await?;
        assert_eq!(
            account.and_then(|a| a.verification_token_hash),
            Some("t2".to_string())
        );

        store.consume_verification_token("t2", now).await?;
        assert!(
            !store
                .reissue_verification_token(created.id, "t3", now + Duration::hours(2))
                .await?
        );
        assert!(
            !store
                .reissue_verification_token(Uuid::new_v4(), "t4", now)
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn save_persists_mutations() -> anyhow::Result<()> {
        let store = MemoryAccountStore::new();
        let now = Utc::now();
        let mut account = store
            .create(new_account("a@x.com", "t1", now + Duration::hours(1)))
            .await?;

        account.username = "alice2".to_string();
        store.save(&account).await?;

        let stored = store.find_by_id(account.id).await?;
        assert_eq!(stored.map(|a| a.username), Some("alice2".to_string()));
        Ok(())
    }
}
