//! Backend collaborators.
//!
//! Every remote concern the client depends on sits behind one of these
//! traits. The backend is authoritative for orders and wallets; nothing here
//! computes a balance or advances an order locally.

use std::error::Error as StdError;

use async_trait::async_trait;
use canteen::{
    checkout::OrderRequest,
    delivery::{DeliveryProfile, RecipientRecord},
    money::Amount,
    orders::{Order, OrderAction, OrderUuid, Shortfall, TransitionError},
};
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The backend could not be reached or answered with something unusable.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, timeout or TLS failure. Safe to retry.
    #[error("backend unreachable: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// The backend answered with a status or body the client does not
    /// understand.
    #[error("unexpected response from backend: {0}")]
    UnexpectedResponse(String),

    /// The configured backend URL cannot have paths appended to it.
    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    /// The backend refused the request outright.
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::UnexpectedResponse(error.to_string());
        }

        Self::Transport(Box::new(error))
    }
}

/// A transition call that did not produce a new snapshot.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// A guard refused the action; the order is unchanged.
    #[error(transparent)]
    Refused(#[from] TransitionError),

    /// The wallet could not cover a debit the backend attempted.
    #[error("balance {available} does not cover {required}")]
    InsufficientBalance {
        /// Amount the backend tried to debit
        required: Amount,
        /// Balance at the time
        available: Amount,
    },

    /// No such order.
    #[error("order {0} not found")]
    NotFound(OrderUuid),

    /// Transport or protocol failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// The backend's answer to a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// New authoritative snapshot
    pub order: Order,

    /// Set when a paying transition closed the order for lack of funds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<Shortfall>,
}

#[automock]
#[async_trait]
/// Wallet balances, owned by the remote ledger.
pub trait WalletGateway: Send + Sync {
    /// Fetches the current balance. Never cached.
    async fn balance(&self, account: &str) -> Result<Amount, GatewayError>;
}

#[automock]
#[async_trait]
/// The caller's own profile.
pub trait ProfileService: Send + Sync {
    /// Fetches the caller's delivery profile.
    async fn get_profile(&self) -> Result<DeliveryProfile, GatewayError>;
}

#[automock]
#[async_trait]
/// Lookup of other platform accounts.
pub trait RecipientLookup: Send + Sync {
    /// Finds an account's delivery details; `None` when no account has the
    /// username.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<RecipientRecord>, GatewayError>;
}

#[automock]
#[async_trait]
/// Order submission and transitions.
pub trait OrderEndpoint: Send + Sync {
    /// Submits a validated request; the backend creates a pending order.
    async fn submit(&self, request: OrderRequest) -> Result<Order, GatewayError>;

    /// Fetches the latest snapshot of an order.
    async fn fetch(&self, order: OrderUuid) -> Result<Order, EndpointError>;

    /// Lists the caller's orders, newest first.
    async fn list(&self) -> Result<Vec<Order>, GatewayError>;

    /// Applies an action. Any debit or refund happens on the backend as a
    /// consequence of this call.
    async fn transition(
        &self,
        order: OrderUuid,
        action: OrderAction,
    ) -> Result<TransitionOutcome, EndpointError>;
}
