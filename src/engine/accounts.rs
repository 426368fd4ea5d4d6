//! Account operations: `create_account`, `update_profile`.

use tracing::info;

use super::{account_exists, load_account, Engine};
use crate::error::{Result, SignHubError};
use crate::model::{Account, Identity};
use crate::validation;

impl Engine {
    pub async fn create_account(
        &self,
        identity: Identity,
        full_name: &str,
        nickname: &str,
        email: &str,
    ) -> Result<Account> {
        validation::validate_full_name(full_name)?;
        validation::validate_nickname(nickname)?;
        validation::validate_email(email)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        if account_exists(&tx, identity)? {
            return Err(SignHubError::conflict("AccountAlreadyExists"));
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO account (identity, full_name, nickname, email, active_company_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            (identity, full_name.trim(), nickname.trim(), email.trim(), now),
        )?;

        let account = load_account(&tx, identity)?;
        tx.commit()?;
        info!(identity = %identity, "account created");
        Ok(account)
    }

    pub async fn update_profile(&self, identity: Identity, nickname: &str, email: &str) -> Result<Account> {
        validation::validate_nickname(nickname)?;
        validation::validate_email(email)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        load_account(&tx, identity)?; // AccountNotFound if missing

        tx.execute(
            "UPDATE account SET nickname = ?2, email = ?3 WHERE identity = ?1",
            (identity, nickname.trim(), email.trim()),
        )?;

        let account = load_account(&tx, identity)?;
        tx.commit()?;
        info!(identity = %identity, "profile updated");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::test_db;
    use crate::invite_code::SequentialCodeRng;
    use std::sync::Arc;

    fn test_engine() -> Engine {
        Engine::new(test_db(), Arc::new(FixedClock::starting_at(1)), Arc::new(SequentialCodeRng::new()), 1000)
    }

    #[tokio::test]
    async fn create_account_rejects_duplicate() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let err = engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap_err();
        assert!(err.to_string().contains("AccountAlreadyExists"));
    }

    #[tokio::test]
    async fn create_account_rejects_empty_fields() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let err = engine.create_account(alice, "", "Alice", "alice@a.test").await.unwrap_err();
        assert!(err.to_string().contains("FullNameEmpty"));
    }

    #[tokio::test]
    async fn update_profile_requires_existing_account() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let err = engine.update_profile(alice, "Alice", "alice@a.test").await.unwrap_err();
        assert!(err.to_string().contains("AccountNotFound"));
    }

    #[tokio::test]
    async fn update_profile_changes_only_nickname_and_email() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        engine.create_account(alice, "Alice Smith", "Ali", "ali@a.test").await.unwrap();
        let updated = engine.update_profile(alice, "A.Smith", "a.smith@a.test").await.unwrap();
        assert_eq!(updated.full_name, "Alice Smith");
        assert_eq!(updated.nickname, "A.Smith");
        assert_eq!(updated.email, "a.smith@a.test");
    }
}
