//! Currency balances.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::EngineError;
use crate::domain::{Balance, UserId};
use crate::engine::VelocityTracker;
use crate::store::{KeyedLocks, Store};

/// Observer notified after every durable balance write.
pub trait BalanceHook: Send + Sync + fmt::Debug {
    fn balance_written(&self, user: &UserId, amount: i64, at: DateTime<Utc>);
}

impl BalanceHook for VelocityTracker {
    fn balance_written(&self, _user: &UserId, _amount: i64, at: DateTime<Utc>) {
        self.record(at);
    }
}

/// Non-negative integer balances per user, defaulting to zero.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: Arc<Store>,
    locks: Arc<KeyedLocks>,
    hooks: Vec<Arc<dyn BalanceHook>>,
}

impl Ledger {
    /// `locks` is keyed by user id and must be shared with every other
    /// service that mutates balances.
    pub fn new(store: Arc<Store>, locks: Arc<KeyedLocks>) -> Self {
        Self {
            store,
            locks,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn BalanceHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub(crate) fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Current balance of `user`, zero if never written.
    pub async fn get_balance(&self, user: &UserId) -> Result<i64, EngineError> {
        Ok(self.store.load_balance(user).await?.unwrap_or(0))
    }

    /// Overwrite a balance.
    pub async fn set_balance(&self, user: &UserId, amount: i64) -> Result<(), EngineError> {
        let _guard = self.locks.lock(user.as_str()).await;
        self.write_balance(user, amount, Utc::now()).await
    }

    /// Add `amount` to a balance, returning the new balance.
    pub async fn credit(&self, user: &UserId, amount: i64) -> Result<i64, EngineError> {
        let _guard = self.locks.lock(user.as_str()).await;
        self.credit_locked(user, amount).await
    }

    /// Remove `amount` from a balance, returning the new balance.
    pub async fn debit(&self, user: &UserId, amount: i64) -> Result<i64, EngineError> {
        let _guard = self.locks.lock(user.as_str()).await;
        self.debit_locked(user, amount).await
    }

    /// Move `amount` from one user to another.
    ///
    /// Both users are locked for the whole operation. The debit is written
    /// before the credit.
    pub async fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: i64,
    ) -> Result<(), EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidAmount(format!(
                "transfer amount must not be negative, got {amount}"
            )));
        }
        if from == to {
            return Err(EngineError::InvalidAmount(format!(
                "cannot transfer from {from} to itself"
            )));
        }

        let _guards = self.locks.lock_many(&[from.as_str(), to.as_str()]).await;

        let available = self.get_balance(from).await?;
        if available < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        let receiving = self.get_balance(to).await?;
        let credited = receiving
            .checked_add(amount)
            .ok_or_else(|| EngineError::InvalidAmount(format!("balance of {to} would overflow")))?;

        let at = Utc::now();
        self.write_balance(from, available - amount, at).await?;
        self.write_balance(to, credited, at).await?;

        tracing::info!(from = %from, to = %to, amount, "transfer completed");
        Ok(())
    }

    /// Balances sorted descending by amount, ties by user id, paginated.
    pub async fn leaderboard(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Balance>, EngineError> {
        let balances = self.store.load_balances().await?;
        Ok(balances.into_iter().skip(offset).take(limit).collect())
    }

    /// Sum of every stored balance.
    pub async fn total_balances(&self) -> Result<i64, EngineError> {
        let balances = self.store.load_balances().await?;
        Ok(balances
            .iter()
            .fold(0i64, |total, b| total.saturating_add(b.amount)))
    }

    /// Credit with the user lock already held by the caller.
    pub(crate) async fn credit_locked(
        &self,
        user: &UserId,
        amount: i64,
    ) -> Result<i64, EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidAmount(format!(
                "credit must not be negative, got {amount}"
            )));
        }
        let balance = self.get_balance(user).await?.checked_add(amount).ok_or_else(|| {
            EngineError::InvalidAmount(format!("balance of {user} would overflow"))
        })?;
        self.write_balance(user, balance, Utc::now()).await?;
        Ok(balance)
    }

    /// Debit with the user lock already held by the caller.
    pub(crate) async fn debit_locked(
        &self,
        user: &UserId,
        amount: i64,
    ) -> Result<i64, EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidAmount(format!(
                "debit must not be negative, got {amount}"
            )));
        }
        let available = self.get_balance(user).await?;
        if available < amount {
            return Err(EngineError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        let balance = available - amount;
        self.write_balance(user, balance, Utc::now()).await?;
        Ok(balance)
    }

    async fn write_balance(
        &self,
        user: &UserId,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidAmount(format!(
                "balance must not be negative, got {amount}"
            )));
        }
        self.store.save_balance(user, amount, at).await?;
        for hook in &self.hooks {
            hook.balance_written(user, amount, at);
        }
        tracing::debug!(user = %user, amount, "balance written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FlushPolicy, MemoryPersistence, StoreError};

    fn ledger() -> (Ledger, Arc<MemoryPersistence>) {
        let backend = Arc::new(MemoryPersistence::new());
        let store = Arc::new(Store::new(backend.clone(), FlushPolicy::Immediate));
        (Ledger::new(store, Arc::new(KeyedLocks::new())), backend)
    }

    fn u(id: &str) -> UserId {
        UserId::new(id)
    }

    #[tokio::test]
    async fn test_unknown_user_has_zero_balance() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.get_balance(&u("ghost")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_balance_rejects_negative() {
        let (ledger, _) = ledger();
        let err = ledger.set_balance(&u("a"), -1).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
        assert_eq!(ledger.get_balance(&u("a")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let (ledger, _) = ledger();
        ledger.set_balance(&u("A"), 1000).await.unwrap();

        ledger.transfer(&u("A"), &u("B"), 400).await.unwrap();
        assert_eq!(ledger.get_balance(&u("A")).await.unwrap(), 600);
        assert_eq!(ledger.get_balance(&u("B")).await.unwrap(), 400);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() {
        let (ledger, _) = ledger();
        ledger.set_balance(&u("A"), 100).await.unwrap();

        let err = ledger.transfer(&u("A"), &u("B"), 101).await.unwrap_err();
        match err {
            EngineError::InsufficientFunds { needed, available } => {
                assert_eq!(needed, 101);
                assert_eq!(available, 100);
            }
            other => panic!("Expected InsufficientFunds, got {other:?}"),
        }
        assert_eq!(ledger.get_balance(&u("A")).await.unwrap(), 100);
        assert_eq!(ledger.get_balance(&u("B")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transfer_rejects_negative_and_self() {
        let (ledger, _) = ledger();
        ledger.set_balance(&u("A"), 100).await.unwrap();

        assert!(matches!(
            ledger.transfer(&u("A"), &u("B"), -5).await,
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.transfer(&u("A"), &u("A"), 5).await,
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.credit(&u("A"), 50).await.unwrap(), 50);
        assert_eq!(ledger.debit(&u("A"), 20).await.unwrap(), 30);
        assert!(matches!(
            ledger.debit(&u("A"), 31).await,
            Err(EngineError::InsufficientFunds { .. })
        ));
    }

    #[tokio::test]
    async fn test_leaderboard_sorted_and_paginated() {
        let (ledger, _) = ledger();
        ledger.set_balance(&u("a"), 10).await.unwrap();
        ledger.set_balance(&u("b"), 30).await.unwrap();
        ledger.set_balance(&u("c"), 20).await.unwrap();
        ledger.set_balance(&u("d"), 30).await.unwrap();

        let top: Vec<String> = ledger
            .leaderboard(3, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.user.0)
            .collect();
        assert_eq!(top, vec!["b", "d", "c"]);

        let page = ledger.leaderboard(10, 3).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user, u("a"));
        assert_eq!(ledger.total_balances().await.unwrap(), 90);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (ledger, backend) = ledger();
        backend.set_fail_writes(true);
        let err = ledger.set_balance(&u("a"), 5).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_hook_sees_every_write() {
        let tracker = Arc::new(VelocityTracker::new());
        let (ledger, _) = ledger();
        let ledger = ledger.with_hook(tracker.clone());

        assert!(tracker.last_mutation().is_none());
        ledger.set_balance(&u("A"), 100).await.unwrap();
        assert!(tracker.last_mutation().is_some());
    }
}
