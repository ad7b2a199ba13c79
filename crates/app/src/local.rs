//! In-process backend.
//!
//! Runs the settlement engine in memory so the client can be exercised
//! without a server. The state can be written to and read back from a JSON
//! file, which is how the CLI keeps orders between invocations in offline
//! mode.

use std::{io, path::Path};

use async_trait::async_trait;
use canteen::{
    checkout::OrderRequest,
    delivery::{DeliveryProfile, RecipientRecord},
    money::Amount,
    orders::{Order, OrderAction, OrderUuid, TransitionError},
    settlement::{LedgerError, MemoryLedger, Settlement, SettlementError, WalletLedger},
};
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::gateways::{
    EndpointError, GatewayError, OrderEndpoint, ProfileService, RecipientLookup, TransitionOutcome,
    WalletGateway,
};

/// Errors loading or saving offline state.
#[derive(Debug, Error)]
pub enum LocalStateError {
    /// The state file could not be read or written.
    #[error("offline state i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The state file is not valid JSON state.
    #[error("offline state is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Everything the in-process backend owns.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default)]
    orders: FxHashMap<OrderUuid, Order>,
    #[serde(default)]
    settlement: Settlement<MemoryLedger>,
    #[serde(default)]
    profile: DeliveryProfile,
    #[serde(default)]
    recipients: FxHashMap<String, RecipientRecord>,
}

/// Backend that keeps orders and wallets in memory for one account.
#[derive(Debug)]
pub struct LocalBackend {
    account: String,
    state: Mutex<LocalState>,
}

impl LocalBackend {
    /// Starts with no orders and an empty wallet.
    pub fn new(account: impl Into<String>) -> Self {
        Self::from_state(account, LocalState::default())
    }

    /// Resumes from previously saved state.
    pub fn from_state(account: impl Into<String>, state: LocalState) -> Self {
        Self {
            account: account.into(),
            state: Mutex::new(state),
        }
    }

    /// Reads state from `path`; a missing file starts fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(account: impl Into<String>, path: &Path) -> Result<Self, LocalStateError> {
        let state = match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(error) if error.kind() == io::ErrorKind::NotFound => LocalState::default(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self::from_state(account, state))
    }

    /// Writes state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or written.
    pub async fn save(&self, path: &Path) -> Result<(), LocalStateError> {
        let raw = serde_json::to_string_pretty(&*self.state.lock().await)?;

        tokio::fs::write(path, raw).await?;

        Ok(())
    }

    /// The account this backend serves.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Adds money to the account's wallet.
    ///
    /// # Errors
    ///
    /// Returns an error if the balance would overflow.
    pub async fn deposit(&self, amount: Amount) -> Result<Amount, LedgerError> {
        let mut state = self.state.lock().await;
        let ledger = state.settlement.ledger_mut();

        let balance = ledger.balance(&self.account)?.checked_add(amount)?;
        ledger.set_balance(self.account.clone(), balance);

        info!(account = %self.account, %amount, %balance, "wallet topped up");

        Ok(balance)
    }

    /// Replaces the account's delivery profile. The wallet balance in the
    /// profile is ignored; it always reflects the ledger.
    pub async fn set_profile(&self, profile: DeliveryProfile) {
        self.state.lock().await.profile = profile;
    }

    /// Registers another account that orders can be delivered to.
    pub async fn register_recipient(&self, record: RecipientRecord) {
        self.state
            .lock()
            .await
            .recipients
            .insert(record.username.clone(), record);
    }

    /// Number of ledger movements recorded for one order.
    pub async fn ledger_entry_count(&self, order: OrderUuid) -> usize {
        self.state
            .lock()
            .await
            .settlement
            .ledger()
            .entries_for(order)
            .count()
    }
}

#[async_trait]
impl WalletGateway for LocalBackend {
    async fn balance(&self, account: &str) -> Result<Amount, GatewayError> {
        let state = self.state.lock().await;

        state
            .settlement
            .ledger()
            .balance(account)
            .map_err(|error| GatewayError::Rejected(error.to_string()))
    }
}

#[async_trait]
impl ProfileService for LocalBackend {
    async fn get_profile(&self) -> Result<DeliveryProfile, GatewayError> {
        let state = self.state.lock().await;

        let wallet_balance = state
            .settlement
            .ledger()
            .balance(&self.account)
            .map_err(|error| GatewayError::Rejected(error.to_string()))?;

        Ok(DeliveryProfile {
            wallet_balance,
            ..state.profile.clone()
        })
    }
}

#[async_trait]
impl RecipientLookup for LocalBackend {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<RecipientRecord>, GatewayError> {
        Ok(self.state.lock().await.recipients.get(username).cloned())
    }
}

#[async_trait]
impl OrderEndpoint for LocalBackend {
    async fn submit(&self, request: OrderRequest) -> Result<Order, GatewayError> {
        let order = Order::place(OrderUuid::now_v7(), &self.account, request, Timestamp::now())
            .map_err(|error| GatewayError::Rejected(error.to_string()))?;

        info!(order = %order.id, total = %order.total_price, "order placed");

        self.state.lock().await.orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn fetch(&self, order: OrderUuid) -> Result<Order, EndpointError> {
        self.state
            .lock()
            .await
            .orders
            .get(&order)
            .cloned()
            .ok_or(EndpointError::NotFound(order))
    }

    async fn list(&self) -> Result<Vec<Order>, GatewayError> {
        let mut orders: Vec<Order> = self.state.lock().await.orders.values().cloned().collect();

        orders.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(orders)
    }

    async fn transition(
        &self,
        order: OrderUuid,
        action: OrderAction,
    ) -> Result<TransitionOutcome, EndpointError> {
        let mut state = self.state.lock().await;

        let current = state
            .orders
            .get(&order)
            .cloned()
            .ok_or(EndpointError::NotFound(order))?;

        let transition = match state.settlement.apply(&current, &action) {
            Ok(transition) => transition,
            Err(SettlementError::Transition(refused)) => return Err(refused.into()),
            Err(SettlementError::Ledger(LedgerError::InsufficientFunds {
                required,
                available,
                ..
            })) => {
                return Err(EndpointError::InsufficientBalance {
                    required,
                    available,
                });
            }
            Err(SettlementError::Ledger(LedgerError::Amount(_))) => {
                return Err(TransitionError::Overflow.into());
            }
        };

        state.orders.insert(order, transition.order.clone());

        Ok(TransitionOutcome {
            order: transition.order,
            shortfall: transition.shortfall,
        })
    }
}

#[cfg(test)]
mod tests {
    use canteen::{
        cart::{LineItem, Meal},
        delivery::DeliveryTarget,
        orders::{OrderStatus, Party},
    };
    use tempfile::TempDir;
    use testresult::TestResult;

    use super::*;

    fn request(fee: u64) -> OrderRequest {
        OrderRequest {
            restaurant_id: "r1".to_string(),
            line_items: vec![LineItem::new(Meal::new("m1", "r1", Amount::new(500)), 2)],
            note: String::new(),
            authorized_fee: Amount::new(fee),
            delivery: DeliveryTarget::Myself {
                location: "Hall 3".to_string(),
                phone: "0800".to_string(),
                landmark: "Gate".to_string(),
            },
            total_price: Amount::new(1000 + fee),
        }
    }

    #[tokio::test]
    async fn confirmation_debits_the_wallet() -> TestResult {
        let backend = LocalBackend::new("acct-1");
        backend.deposit(Amount::new(5000)).await?;

        let order = backend.submit(request(1000)).await?;
        let outcome = backend
            .transition(order.id, OrderAction::Confirm { fee: None })
            .await?;

        assert_eq!(outcome.order.status, OrderStatus::Confirmed);
        assert_eq!(backend.balance("acct-1").await?, Amount::new(3000));
        assert_eq!(backend.fetch(order.id).await?, outcome.order);
        assert_eq!(backend.ledger_entry_count(order.id).await, 1);

        Ok(())
    }

    #[tokio::test]
    async fn refusals_leave_the_stored_order_alone() -> TestResult {
        let backend = LocalBackend::new("acct-1");

        let order = backend.submit(request(1000)).await?;
        let result = backend.transition(order.id, OrderAction::MarkDelivered).await;

        assert!(
            matches!(
                result,
                Err(EndpointError::Refused(TransitionError::InvalidTransition { .. }))
            ),
            "got {result:?}"
        );
        assert_eq!(backend.fetch(order.id).await?, order);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_orders_are_not_found() {
        let backend = LocalBackend::new("acct-1");
        let id = OrderUuid::now_v7();

        let result = backend
            .transition(
                id,
                OrderAction::Cancel {
                    by: Party::Customer,
                },
            )
            .await;

        assert!(matches!(result, Err(EndpointError::NotFound(got)) if got == id), "got {result:?}");
    }

    #[tokio::test]
    async fn profile_reports_the_ledger_balance() -> TestResult {
        let backend = LocalBackend::new("acct-1");

        backend
            .set_profile(DeliveryProfile {
                location: "Hall 3".to_string(),
                phone: "0800".to_string(),
                landmark: "Gate".to_string(),
                wallet_balance: Amount::new(999_999),
            })
            .await;
        backend.deposit(Amount::new(700)).await?;

        let profile = backend.get_profile().await?;

        assert_eq!(profile.wallet_balance, Amount::new(700));
        assert_eq!(profile.location, "Hall 3");

        Ok(())
    }

    #[tokio::test]
    async fn state_survives_a_save_and_load() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("offline.json");

        let backend = LocalBackend::new("acct-1");
        backend.deposit(Amount::new(5000)).await?;
        let order = backend.submit(request(600)).await?;
        backend
            .transition(order.id, OrderAction::Confirm { fee: None })
            .await?;
        backend.save(&path).await?;

        let resumed = LocalBackend::load("acct-1", &path).await?;

        assert_eq!(resumed.fetch(order.id).await?.status, OrderStatus::Confirmed);
        assert_eq!(resumed.balance("acct-1").await?, Amount::new(3400));

        let fresh = LocalBackend::load("acct-1", &dir.path().join("missing.json")).await?;

        assert!(fresh.list().await?.is_empty());

        Ok(())
    }
}
