//! Settlement
//!
//! Executes planned transitions against a wallet ledger. This is the
//! authoritative side of the order protocol: the balance is read right before
//! the guard, and the debit or refund that goes with a transition is carried
//! out before the new snapshot is handed back.

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    money::{Amount, AmountError},
    orders::{self, Effect, Order, OrderAction, OrderUuid, Transition, TransitionError},
};

/// Errors raised by a ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The account cannot cover the debit.
    #[error("account {account} has {available}, needs {required}")]
    InsufficientFunds {
        /// Account identifier
        account: String,
        /// Debit amount
        required: Amount,
        /// Current balance
        available: Amount,
    },

    /// Crediting overflowed the balance.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Errors raised while settling a transition.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// A guard refused the action.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The ledger refused the wallet effect.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Money taken from the account
    Debit,
    /// Money returned to the account
    Credit,
}

/// A recorded ledger movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Account identifier
    pub account: String,
    /// Order the movement belongs to
    pub order: OrderUuid,
    /// Direction
    pub kind: EntryKind,
    /// Amount moved
    pub amount: Amount,
}

/// Wallet balances, owned by whoever settles orders.
pub trait WalletLedger {
    /// Current balance; unknown accounts hold zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    fn balance(&self, account: &str) -> Result<Amount, LedgerError>;

    /// Takes `amount` from the account for an order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] if the balance is short.
    fn debit(&mut self, account: &str, order: OrderUuid, amount: Amount)
    -> Result<(), LedgerError>;

    /// Returns `amount` to the account for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance would overflow.
    fn credit(
        &mut self,
        account: &str,
        order: OrderUuid,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

/// In-memory ledger with a journal of every movement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLedger {
    balances: FxHashMap<String, Amount>,
    journal: Vec<LedgerEntry>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an account balance outright, e.g. after a top-up.
    pub fn set_balance(&mut self, account: impl Into<String>, amount: Amount) {
        self.balances.insert(account.into(), amount);
    }

    /// Every movement so far, oldest first.
    pub fn journal(&self) -> &[LedgerEntry] {
        &self.journal
    }

    /// Movements for one order.
    pub fn entries_for(&self, order: OrderUuid) -> impl Iterator<Item = &LedgerEntry> {
        self.journal.iter().filter(move |entry| entry.order == order)
    }
}

impl WalletLedger for MemoryLedger {
    fn balance(&self, account: &str) -> Result<Amount, LedgerError> {
        Ok(self.balances.get(account).copied().unwrap_or_default())
    }

    fn debit(
        &mut self,
        account: &str,
        order: OrderUuid,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let available = self.balance(account)?;

        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: account.to_string(),
                required: amount,
                available,
            });
        }

        self.balances
            .insert(account.to_string(), available.saturating_sub(amount));
        self.journal.push(LedgerEntry {
            account: account.to_string(),
            order,
            kind: EntryKind::Debit,
            amount,
        });

        Ok(())
    }

    fn credit(
        &mut self,
        account: &str,
        order: OrderUuid,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self.balance(account)?.checked_add(amount)?;

        self.balances.insert(account.to_string(), balance);
        self.journal.push(LedgerEntry {
            account: account.to_string(),
            order,
            kind: EntryKind::Credit,
            amount,
        });

        Ok(())
    }
}

/// Applies order actions against a ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settlement<L: WalletLedger> {
    ledger: L,
}

impl<L: WalletLedger> Settlement<L> {
    /// Wraps a ledger.
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// The ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The ledger, mutably.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Plans `action` with a freshly read balance and carries out its wallet
    /// effect. The returned snapshot is the new authoritative state.
    ///
    /// # Errors
    ///
    /// Returns the guard failure, or a ledger error if the effect could not
    /// be applied; in both cases nothing changed.
    pub fn apply(
        &mut self,
        order: &Order,
        action: &OrderAction,
    ) -> Result<Transition, SettlementError> {
        let balance = self.ledger.balance(&order.customer)?;

        let mut transition = orders::plan(order, action, balance)?;

        match transition.effect {
            Effect::None => {}
            Effect::Debit(amount) => self.ledger.debit(&order.customer, order.id, amount)?,
            Effect::Refund(amount) => self.ledger.credit(&order.customer, order.id, amount)?,
        }

        if transition.changed() {
            transition.order.updated_at = Timestamp::now();

            info!(
                order = %order.id,
                action = action.name(),
                from = %transition.from,
                to = %transition.order.status,
                effect = ?transition.effect,
                "order transitioned"
            );
        } else {
            debug!(order = %order.id, action = action.name(), "order unchanged");
        }

        Ok(transition)
    }
}
