//! Orders service.
//!
//! Restaurant and customer operations on placed orders. Every operation is a
//! single request to the backend; the snapshot it returns is the only thing
//! that updates the local [`OrderBook`]. Guard failures come back as
//! [`OrderServiceError`] variants that say what the user can do next.

use std::sync::Arc;

use canteen::{
    money::Amount,
    orders::{Order, OrderAction, OrderStatus, OrderUuid, Party, TransitionError},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    book::OrderBook,
    gateways::{EndpointError, GatewayError, OrderEndpoint, TransitionOutcome, WalletGateway},
};

/// What the user should be offered after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Add at least this much to the wallet.
    TopUp {
        /// Missing amount
        amount: Amount,
    },
    /// Send the fee to the customer for approval instead of confirming.
    SendForApproval {
        /// Fee to propose
        fee: Amount,
    },
    /// Nothing changed; the same request can be sent again.
    Retry,
}

/// Order operation failures.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The wallet could not cover the total. When the backend closed the
    /// order because of it, the canceled snapshot is attached.
    #[error("wallet balance {available} does not cover {required}; top up {top_up}")]
    InsufficientBalance {
        /// Snapshot after the failed attempt, if the backend sent one
        order: Option<Box<Order>>,
        /// Total that had to be paid
        required: Amount,
        /// Balance at the time
        available: Amount,
        /// How much to add
        top_up: Amount,
    },

    /// The restaurant tried to confirm with a fee above the ceiling.
    #[error("fee {proposed} exceeds the authorized {ceiling}; send it to the customer for approval")]
    FeeExceedsLimit {
        /// Fee the restaurant wanted
        proposed: Amount,
        /// Customer's ceiling
        ceiling: Amount,
    },

    /// The action is not legal from the order's current status.
    #[error("cannot {action} an order that is {from}")]
    InvalidTransition {
        /// Status at the time
        from: OrderStatus,
        /// Action name
        action: String,
    },

    /// No such order.
    #[error("order {0} not found")]
    NotFound(OrderUuid),

    /// Order amounts overflowed.
    #[error("order amounts overflow")]
    Overflow,

    /// The backend could not be reached. Safe to retry.
    #[error(transparent)]
    Transport(#[from] GatewayError),
}

impl OrderServiceError {
    /// The path to offer the user, if there is one.
    pub fn next_step(&self) -> Option<NextStep> {
        match self {
            Self::InsufficientBalance { top_up, .. } => Some(NextStep::TopUp { amount: *top_up }),
            Self::FeeExceedsLimit { proposed, .. } => {
                Some(NextStep::SendForApproval { fee: *proposed })
            }
            Self::Transport(GatewayError::Transport(_)) => Some(NextStep::Retry),
            _ => None,
        }
    }
}

impl From<EndpointError> for OrderServiceError {
    fn from(error: EndpointError) -> Self {
        match error {
            EndpointError::Refused(TransitionError::FeeExceedsLimit { proposed, ceiling }) => {
                Self::FeeExceedsLimit { proposed, ceiling }
            }
            EndpointError::Refused(TransitionError::InvalidTransition { from, action }) => {
                Self::InvalidTransition { from, action }
            }
            EndpointError::Refused(TransitionError::Overflow) => Self::Overflow,
            EndpointError::InsufficientBalance {
                required,
                available,
            } => Self::InsufficientBalance {
                order: None,
                required,
                available,
                top_up: required.saturating_sub(available),
            },
            EndpointError::NotFound(id) => Self::NotFound(id),
            EndpointError::Gateway(error) => Self::Transport(error),
        }
    }
}

/// Whether a freshly read balance covers what an order still needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordability {
    /// Balance just read from the wallet
    pub balance: Amount,
    /// Amount the next paying transition will debit
    pub required: Amount,
}

impl Affordability {
    /// Whether the balance covers the total.
    pub fn covers(&self) -> bool {
        self.balance >= self.required
    }

    /// How much is missing.
    pub fn top_up(&self) -> Amount {
        self.required.saturating_sub(self.balance)
    }
}

/// Order operations for one signed-in account.
pub struct OrdersService {
    endpoint: Arc<dyn OrderEndpoint>,
    wallet: Arc<dyn WalletGateway>,
    account: String,
    book: Mutex<OrderBook>,
}

impl OrdersService {
    #[must_use]
    pub fn new(
        endpoint: Arc<dyn OrderEndpoint>,
        wallet: Arc<dyn WalletGateway>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            wallet,
            account: account.into(),
            book: Mutex::new(OrderBook::new()),
        }
    }

    /// Starts following an order, e.g. one just placed.
    pub async fn follow(&self, order: Order) {
        self.book.lock().await.track(order);
    }

    /// Stops following an order; responses still in flight for it are
    /// discarded when they arrive.
    pub async fn unfollow(&self, id: OrderUuid) {
        self.book.lock().await.forget(id);
    }

    /// The local view of every followed order, newest first.
    pub async fn followed(&self) -> Vec<Order> {
        self.book
            .lock()
            .await
            .orders()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Fetches the latest snapshot and follows it.
    ///
    /// # Errors
    ///
    /// Returns [`OrderServiceError::NotFound`] or a transport failure.
    pub async fn refresh(&self, id: OrderUuid) -> Result<Order, OrderServiceError> {
        let order = self.endpoint.fetch(id).await?;

        self.book.lock().await.track(order.clone());

        Ok(order)
    }

    /// Fetches every order for the account and follows them.
    ///
    /// # Errors
    ///
    /// Returns a transport failure.
    pub async fn refresh_all(&self) -> Result<Vec<Order>, OrderServiceError> {
        let orders = self.endpoint.list().await?;

        let mut book = self.book.lock().await;
        for order in &orders {
            book.track(order.clone());
        }

        Ok(orders)
    }

    /// Restaurant accepts the order, optionally setting a fee within the
    /// authorized ceiling.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn confirm(
        &self,
        id: OrderUuid,
        fee: Option<Amount>,
    ) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::Confirm { fee }).await
    }

    /// Restaurant proposes a fee. Above the ceiling the order waits for the
    /// customer; otherwise it confirms directly.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn request_fee(
        &self,
        id: OrderUuid,
        fee: Amount,
        description: impl Into<String>,
    ) -> Result<Order, OrderServiceError> {
        self.apply(
            id,
            OrderAction::RequestFee {
                fee,
                description: description.into(),
            },
        )
        .await
    }

    /// Restaurant turns the order down.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn reject(&self, id: OrderUuid) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::Reject).await
    }

    /// Restaurant hands the order over.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn mark_delivered(&self, id: OrderUuid) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::MarkDelivered).await
    }

    /// Customer accepts the requested fee.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`]. A short wallet closes the order and
    /// comes back as [`OrderServiceError::InsufficientBalance`].
    pub async fn accept_fee(&self, id: OrderUuid) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::AcceptFee).await
    }

    /// Customer declines the requested fee, closing the order.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn decline_fee(&self, id: OrderUuid) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::DeclineFee).await
    }

    /// Closes the order. Safe to repeat.
    ///
    /// # Errors
    ///
    /// See [`OrdersService::apply`].
    pub async fn cancel(&self, id: OrderUuid, by: Party) -> Result<Order, OrderServiceError> {
        self.apply(id, OrderAction::Cancel { by }).await
    }

    /// Sends one action and reconciles the answer into the book.
    ///
    /// # Errors
    ///
    /// - [`OrderServiceError::InsufficientBalance`]: the wallet was short at
    ///   a paying transition.
    /// - [`OrderServiceError::FeeExceedsLimit`]: confirm above the ceiling.
    /// - [`OrderServiceError::InvalidTransition`]: not legal from the current status.
    /// - [`OrderServiceError::NotFound`]: no such order.
    /// - [`OrderServiceError::Transport`]: the backend could not be reached.
    pub async fn apply(
        &self,
        id: OrderUuid,
        action: OrderAction,
    ) -> Result<Order, OrderServiceError> {
        let name = action.name();

        let TransitionOutcome { order, shortfall } =
            match self.endpoint.transition(id, action).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(order = %id, action = name, "transition failed: {error}");
                    return Err(error.into());
                }
            };

        self.book.lock().await.reconcile(order.clone());

        if let Some(shortfall) = shortfall {
            warn!(
                order = %id,
                action = name,
                required = %shortfall.required,
                available = %shortfall.available,
                "order closed for insufficient balance"
            );

            return Err(OrderServiceError::InsufficientBalance {
                order: Some(Box::new(order)),
                required: shortfall.required,
                available: shortfall.available,
                top_up: shortfall.top_up(),
            });
        }

        info!(order = %id, action = name, status = %order.status, "order updated");

        Ok(order)
    }

    /// Reads the wallet balance now and compares it with what the order
    /// still needs. Returns `None` when nothing is left to pay.
    ///
    /// This is a display hint only; the backend makes the decision when the
    /// paying transition is sent.
    ///
    /// # Errors
    ///
    /// Returns a transport failure if the balance cannot be read.
    pub async fn affordability(
        &self,
        order: &Order,
    ) -> Result<Option<Affordability>, OrderServiceError> {
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::FeeRequested) {
            return Ok(None);
        }

        let balance = self.wallet.balance(&self.account).await?;

        Ok(Some(Affordability {
            balance,
            required: order.total_price,
        }))
    }
}

#[cfg(test)]
mod tests {
    use canteen::{
        cart::{LineItem, Meal},
        checkout::OrderRequest,
        delivery::DeliveryTarget,
        orders::plan,
    };
    use jiff::Timestamp;
    use testresult::TestResult;

    use crate::gateways::{MockOrderEndpoint, MockWalletGateway};

    use super::*;

    fn pending(food: u64, fee: u64) -> Result<Order, Box<dyn std::error::Error>> {
        Ok(Order::place(
            OrderUuid::now_v7(),
            "acct-1",
            OrderRequest {
                restaurant_id: "r1".to_string(),
                line_items: vec![LineItem::new(Meal::new("m1", "r1", Amount::new(food)), 1)],
                note: String::new(),
                authorized_fee: Amount::new(fee),
                delivery: DeliveryTarget::Myself {
                    location: "Hall 3".to_string(),
                    phone: "0800".to_string(),
                    landmark: "Gate".to_string(),
                },
                total_price: Amount::new(food + fee),
            },
            Timestamp::UNIX_EPOCH,
        )?)
    }

    fn service(endpoint: MockOrderEndpoint, wallet: MockWalletGateway) -> OrdersService {
        OrdersService::new(Arc::new(endpoint), Arc::new(wallet), "acct-1")
    }

    #[tokio::test]
    async fn short_wallet_on_accept_offers_top_up() -> TestResult {
        let requested = plan(
            &pending(1000, 1000)?,
            &OrderAction::RequestFee {
                fee: Amount::new(1500),
                description: "rain".to_string(),
            },
            Amount::ZERO,
        )?
        .order;
        let id = requested.id;
        let outcome = plan(&requested, &OrderAction::AcceptFee, Amount::new(2000))?;

        let mut endpoint = MockOrderEndpoint::new();
        endpoint
            .expect_transition()
            .once()
            .withf(move |order, action| *order == id && *action == OrderAction::AcceptFee)
            .return_once(move |_, _| {
                Ok(TransitionOutcome {
                    order: outcome.order,
                    shortfall: outcome.shortfall,
                })
            });

        let orders = service(endpoint, MockWalletGateway::new());
        orders.follow(requested).await;

        let result = orders.accept_fee(id).await;

        assert!(
            matches!(
                result,
                Err(OrderServiceError::InsufficientBalance { ref order, top_up, .. })
                    if top_up == Amount::new(500)
                        && order.as_ref().map(|o| o.status) == Some(OrderStatus::Canceled)
            ),
            "got {result:?}"
        );
        assert_eq!(
            result.err().and_then(|error| error.next_step()),
            Some(NextStep::TopUp {
                amount: Amount::new(500)
            })
        );
        assert_eq!(
            orders.followed().await.first().map(|o| o.status),
            Some(OrderStatus::Canceled)
        );

        Ok(())
    }

    #[tokio::test]
    async fn confirm_above_ceiling_offers_approval_path() {
        let mut endpoint = MockOrderEndpoint::new();
        endpoint.expect_transition().once().returning(|_, _| {
            Err(EndpointError::Refused(TransitionError::FeeExceedsLimit {
                proposed: Amount::new(1200),
                ceiling: Amount::new(1000),
            }))
        });

        let result = service(endpoint, MockWalletGateway::new())
            .confirm(OrderUuid::now_v7(), Some(Amount::new(1200)))
            .await;

        assert_eq!(
            result.as_ref().err().and_then(OrderServiceError::next_step),
            Some(NextStep::SendForApproval {
                fee: Amount::new(1200)
            }),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn transport_failures_are_retryable() {
        let mut endpoint = MockOrderEndpoint::new();
        endpoint
            .expect_transition()
            .once()
            .returning(|_, _| Err(GatewayError::Transport("timed out".into()).into()));

        let result = service(endpoint, MockWalletGateway::new())
            .mark_delivered(OrderUuid::now_v7())
            .await;

        assert!(
            matches!(result, Err(OrderServiceError::Transport(GatewayError::Transport(_)))),
            "got {result:?}"
        );
        assert_eq!(
            result.as_ref().err().and_then(OrderServiceError::next_step),
            Some(NextStep::Retry)
        );
    }

    #[tokio::test]
    async fn late_answer_for_unfollowed_order_is_not_kept() -> TestResult {
        let order = pending(1000, 1000)?;
        let id = order.id;
        let confirmed = plan(&order, &OrderAction::Confirm { fee: None }, Amount::new(5000))?;

        let mut endpoint = MockOrderEndpoint::new();
        endpoint.expect_transition().once().return_once(move |_, _| {
            Ok(TransitionOutcome {
                order: confirmed.order,
                shortfall: None,
            })
        });

        let orders = service(endpoint, MockWalletGateway::new());
        orders.follow(order).await;
        orders.unfollow(id).await;

        let snapshot = orders.confirm(id, None).await?;

        assert_eq!(snapshot.status, OrderStatus::Confirmed);
        assert!(orders.followed().await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn affordability_reads_the_balance_every_time() -> TestResult {
        let order = pending(1000, 600)?;

        let mut wallet = MockWalletGateway::new();
        let mut balances = vec![Amount::new(2000), Amount::new(1000)].into_iter();
        wallet
            .expect_balance()
            .times(2)
            .returning(move |_| Ok(balances.next().unwrap_or_default()));

        let orders = service(MockOrderEndpoint::new(), wallet);

        let first = orders.affordability(&order).await?;
        let second = orders.affordability(&order).await?;

        assert_eq!(first.map(|a| a.covers()), Some(true));
        assert_eq!(second.map(|a| a.top_up()), Some(Amount::new(600)));

        Ok(())
    }

    #[tokio::test]
    async fn settled_orders_need_no_balance() -> TestResult {
        let order = pending(1000, 600)?;
        let confirmed = plan(&order, &OrderAction::Confirm { fee: None }, Amount::new(5000))?.order;

        let mut wallet = MockWalletGateway::new();
        wallet.expect_balance().never();

        let hint = service(MockOrderEndpoint::new(), wallet)
            .affordability(&confirmed)
            .await?;

        assert_eq!(hint, None);

        Ok(())
    }
}
