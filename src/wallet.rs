//! Wallet collaborator.
//!
//! The wallet balance is the single piece of shared mutable state this
//! engine touches; every mutation goes through exactly one atomic
//! `debit` or `credit` call. Reason strings embed a correlation id
//! (the bet id) so the wallet layer can deduplicate retried operations.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::EngineError;

/// Abstraction over the wallet/ledger service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Atomically remove `amount` from the user's balance.
    /// Fails with `InsufficientFunds` and no balance change otherwise.
    async fn debit(&self, user_id: &str, amount: Decimal, reason: &str)
        -> Result<(), EngineError>;

    /// Atomically add `amount` to the user's balance.
    async fn credit(&self, user_id: &str, amount: Decimal, reason: &str)
        -> Result<(), EngineError>;

    /// Current balance for a user.
    async fn balance(&self, user_id: &str) -> Result<Decimal, EngineError>;
}

/// In-memory wallet. Accounts are created lazily with the configured
/// opening balance on first touch.
pub struct MemoryWallet {
    opening_balance: Decimal,
    accounts: Mutex<HashMap<String, Decimal>>,
}

impl MemoryWallet {
    pub fn new(opening_balance: Decimal) -> Self {
        Self {
            opening_balance,
            accounts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl WalletService for MemoryWallet {
    async fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "Debit amount must be positive, got {amount}"
            )));
        }

        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .entry(user_id.to_string())
            .or_insert(self.opening_balance);

        if *balance < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available: *balance,
            });
        }

        *balance -= amount;
        debug!(user_id, %amount, balance = %*balance, reason, "Wallet debited");
        Ok(())
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "Credit amount must be positive, got {amount}"
            )));
        }

        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .entry(user_id.to_string())
            .or_insert(self.opening_balance);
        *balance += amount;
        debug!(user_id, %amount, balance = %*balance, reason, "Wallet credited");
        Ok(())
    }

    async fn balance(&self, user_id: &str) -> Result<Decimal, EngineError> {
        let mut accounts = self.accounts.lock().await;
        Ok(*accounts
            .entry(user_id.to_string())
            .or_insert(self.opening_balance))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
