//! Orders
//!
//! The order snapshot and its lifecycle. Orders are owned by the backend; this
//! module describes the legal transitions between snapshots so that both the
//! backend and clients agree on them.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    cart::LineItem,
    checkout::OrderRequest,
    delivery::DeliveryTarget,
    money::{Amount, AmountError},
    pricing,
    uuids::TypedUuid,
};

pub mod lifecycle;
pub mod status;

pub use lifecycle::{Effect, OrderAction, Shortfall, Transition, TransitionError, plan};
pub use status::{OrderStatus, UnknownStatus};

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

/// Who initiated an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The ordering customer
    Customer,
    /// The restaurant fulfilling the order
    Restaurant,
}

/// Why an order was closed without delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CancelReason {
    /// The restaurant turned the order down.
    Rejected,
    /// The customer declined a requested fee.
    FeeDeclined,
    /// The wallet could not cover the total when it had to be paid.
    InsufficientBalance {
        /// Amount that had to be paid
        required: Amount,
        /// Balance at the time
        available: Amount,
    },
    /// An explicit cancel.
    Canceled {
        /// Who canceled
        by: Party,
    },
}

/// Order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderUuid,
    /// Wallet account of the customer
    pub customer: String,
    /// Restaurant identifier
    pub restaurant_id: String,
    /// Lifecycle state
    pub status: OrderStatus,
    /// Ordered lines
    pub line_items: Vec<LineItem>,
    /// Note for the restaurant
    #[serde(default)]
    pub note: String,
    /// Sum of line prices
    pub food_amount: Amount,
    /// Ceiling the customer agreed to at checkout
    pub authorized_fee: Amount,
    /// Current fee
    pub fee: Amount,
    /// Always `food_amount + fee`
    pub total_price: Amount,
    /// Fee the restaurant asked for above the ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_fee: Option<Amount>,
    /// Restaurant's explanation for the requested fee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_description: Option<String>,
    /// Delivery target
    pub delivery: DeliveryTarget,
    /// Amount taken from the wallet, set once on confirmation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debited: Option<Amount>,
    /// Amount returned to the wallet, set once when a paid order is canceled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded: Option<Amount>,
    /// Why the order was canceled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
    /// Incremented on every transition
    pub revision: u64,
    /// Last transition time
    pub updated_at: Timestamp,
}

impl Order {
    /// Creates the pending order for a submitted request. The fee starts at
    /// the authorized ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the totals do not fit.
    pub fn place(
        id: OrderUuid,
        customer: impl Into<String>,
        request: OrderRequest,
        now: Timestamp,
    ) -> Result<Self, AmountError> {
        let food_amount = pricing::food_amount(&request.line_items)?;
        let total_price = food_amount.checked_add(request.authorized_fee)?;

        Ok(Self {
            id,
            customer: customer.into(),
            restaurant_id: request.restaurant_id,
            status: OrderStatus::Pending,
            line_items: request.line_items,
            note: request.note,
            food_amount,
            authorized_fee: request.authorized_fee,
            fee: request.authorized_fee,
            total_price,
            requested_fee: None,
            request_description: None,
            delivery: request.delivery,
            debited: None,
            refunded: None,
            cancel_reason: None,
            revision: 0,
            updated_at: now,
        })
    }

    /// Whether `total_price == food_amount + fee`.
    pub fn is_balanced(&self) -> bool {
        self.food_amount.checked_add(self.fee) == Ok(self.total_price)
    }

    /// Whether the order has been paid for.
    pub fn is_settled(&self) -> bool {
        self.debited.is_some()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::cart::Meal;

    use super::*;

    fn request() -> OrderRequest {
        OrderRequest {
            restaurant_id: "r1".to_string(),
            line_items: vec![LineItem::new(Meal::new("m1", "r1", Amount::new(500)), 2)],
            note: String::new(),
            authorized_fee: Amount::new(1000),
            delivery: DeliveryTarget::Myself {
                location: "Hall 3".to_string(),
                phone: "0800".to_string(),
                landmark: "Gate".to_string(),
            },
            total_price: Amount::new(2000),
        }
    }

    #[test]
    fn place_starts_pending_at_authorized_fee() -> TestResult {
        let order = Order::place(OrderUuid::now_v7(), "acct-1", request(), Timestamp::now())?;

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.food_amount, Amount::new(1000));
        assert_eq!(order.fee, Amount::new(1000));
        assert_eq!(order.total_price, Amount::new(2000));
        assert!(order.is_balanced());
        assert!(!order.is_settled());

        Ok(())
    }

    #[test]
    fn snapshot_round_trips_through_json() -> TestResult {
        let order = Order::place(OrderUuid::now_v7(), "acct-1", request(), Timestamp::now())?;

        let json = serde_json::to_string(&order)?;
        let back: Order = serde_json::from_str(&json)?;

        assert_eq!(back, order);

        Ok(())
    }
}
