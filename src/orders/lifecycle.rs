//! Order lifecycle.
//!
//! ```text
//! Pending ──confirm (fee ≤ ceiling)──────────────> Confirmed ──deliver──> Delivered
//!    │  └──request fee (fee > ceiling)──> FeeRequested ──accept──┘   │
//!    │                                        │                      │
//!    └──reject / cancel / short balance──> Canceled <──decline / cancel / short balance
//! ```
//!
//! [`plan`] is pure: given the current snapshot, an action and a wallet
//! balance read just before the call, it returns the next snapshot and the
//! single wallet effect that goes with it. The wallet is debited exactly once
//! per order, on the transition that first reaches `Confirmed`. A short
//! balance at that point closes the order instead of leaving it waiting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Amount, AmountError};

use super::{CancelReason, Order, OrderStatus, Party};

/// Something a restaurant or customer asks to happen to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderAction {
    /// Restaurant accepts, optionally setting the fee. The fee must not
    /// exceed the authorized ceiling. A fee above it is refused with
    /// [`TransitionError::FeeExceedsLimit`] and leaves the order `Pending`;
    /// resend the same fee as [`OrderAction::RequestFee`] to move the order
    /// to `FeeRequested` for the customer's approval.
    Confirm {
        /// Fee to charge; defaults to the current fee
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fee: Option<Amount>,
    },

    /// Restaurant proposes a fee. Above the ceiling it goes to the customer
    /// for approval; at or below the ceiling it confirms directly.
    RequestFee {
        /// Proposed fee
        fee: Amount,
        /// Why the fee is needed
        #[serde(default)]
        description: String,
    },

    /// Restaurant turns the order down.
    Reject,

    /// Customer accepts the requested fee.
    AcceptFee,

    /// Customer declines the requested fee.
    DeclineFee,

    /// Restaurant hands the order over.
    MarkDelivered,

    /// Either side closes the order.
    Cancel {
        /// Who is canceling
        by: Party,
    },
}

impl OrderAction {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            OrderAction::Confirm { .. } => "confirm",
            OrderAction::RequestFee { .. } => "request_fee",
            OrderAction::Reject => "reject",
            OrderAction::AcceptFee => "accept_fee",
            OrderAction::DeclineFee => "decline_fee",
            OrderAction::MarkDelivered => "mark_delivered",
            OrderAction::Cancel { .. } => "cancel",
        }
    }

    /// Whether applying the action may take money from the wallet.
    pub fn may_debit(&self) -> bool {
        matches!(
            self,
            OrderAction::Confirm { .. } | OrderAction::RequestFee { .. } | OrderAction::AcceptFee
        )
    }
}

/// A guard that refused an action.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TransitionError {
    /// The action is not legal from the current status.
    #[error("cannot {action} an order that is {from}")]
    InvalidTransition {
        /// Status at the time
        from: OrderStatus,
        /// Action name
        action: String,
    },

    /// A direct confirmation tried to charge more than the customer
    /// authorized; the fee has to be sent for approval instead.
    #[error("fee {proposed} exceeds the authorized {ceiling}; send it for approval")]
    FeeExceedsLimit {
        /// Fee the restaurant wanted
        proposed: Amount,
        /// Customer's ceiling
        ceiling: Amount,
    },

    /// Totals overflowed.
    #[error("order amounts overflow")]
    Overflow,
}

impl From<AmountError> for TransitionError {
    fn from(error: AmountError) -> Self {
        match error {
            AmountError::Overflow => TransitionError::Overflow,
        }
    }
}

/// What has to happen to the wallet alongside a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Effect {
    /// Nothing.
    None,
    /// Take the amount from the customer's wallet.
    Debit(Amount),
    /// Return the amount to the customer's wallet.
    Refund(Amount),
}

/// The balance did not cover the total at a paying transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    /// Total that had to be paid
    pub required: Amount,
    /// Balance read before the guard
    pub available: Amount,
}

impl Shortfall {
    /// How much the customer has to top up.
    pub fn top_up(&self) -> Amount {
        self.required.saturating_sub(self.available)
    }
}

/// The outcome of applying an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Status before
    pub from: OrderStatus,
    /// Snapshot after
    pub order: Order,
    /// Wallet effect to carry out
    pub effect: Effect,
    /// Set when the order was closed because the balance was short
    pub shortfall: Option<Shortfall>,
}

impl Transition {
    /// Whether the snapshot changed at all. Repeated cancels do not.
    pub fn changed(&self) -> bool {
        self.from != self.order.status || self.effect != Effect::None
    }
}

/// Works out the next snapshot for `action`.
///
/// `balance` must be read from the ledger immediately before calling; it is
/// only consulted by transitions that pay.
///
/// # Errors
///
/// - [`TransitionError::InvalidTransition`]: not legal from the current status.
/// - [`TransitionError::FeeExceedsLimit`]: `Confirm` with a fee above the ceiling.
/// - [`TransitionError::Overflow`]: totals do not fit.
pub fn plan(
    order: &Order,
    action: &OrderAction,
    balance: Amount,
) -> Result<Transition, TransitionError> {
    let from = order.status;

    match (from, action) {
        (OrderStatus::Pending, OrderAction::Confirm { fee }) => {
            let fee = fee.unwrap_or(order.fee);

            if fee > order.authorized_fee {
                return Err(TransitionError::FeeExceedsLimit {
                    proposed: fee,
                    ceiling: order.authorized_fee,
                });
            }

            settle(order, fee, balance)
        }
        (OrderStatus::Pending, OrderAction::RequestFee { fee, description }) => {
            if *fee <= order.authorized_fee {
                return settle(order, *fee, balance);
            }

            let mut next = order.clone();
            next.fee = *fee;
            next.total_price = next.food_amount.checked_add(*fee)?;
            next.requested_fee = Some(*fee);
            next.request_description =
                Some(description.trim().to_string()).filter(|text| !text.is_empty());

            Ok(advance(from, next, OrderStatus::FeeRequested, Effect::None))
        }
        (OrderStatus::Pending, OrderAction::Reject) => Ok(close(order, CancelReason::Rejected)),
        (OrderStatus::FeeRequested, OrderAction::AcceptFee) => settle(order, order.fee, balance),
        (OrderStatus::FeeRequested, OrderAction::DeclineFee) => {
            Ok(close(order, CancelReason::FeeDeclined))
        }
        (OrderStatus::Confirmed, OrderAction::MarkDelivered) => Ok(advance(
            from,
            order.clone(),
            OrderStatus::Delivered,
            Effect::None,
        )),
        (OrderStatus::Pending | OrderStatus::FeeRequested, OrderAction::Cancel { by }) => {
            Ok(close(order, CancelReason::Canceled { by: *by }))
        }
        (OrderStatus::Confirmed, OrderAction::Cancel { by }) => {
            let mut transition = close(order, CancelReason::Canceled { by: *by });

            if let (Some(debited), None) = (order.debited, order.refunded) {
                transition.order.refunded = Some(debited);
                transition.effect = Effect::Refund(debited);
            }

            Ok(transition)
        }
        (OrderStatus::Canceled, OrderAction::Cancel { .. }) => Ok(Transition {
            from,
            order: order.clone(),
            effect: Effect::None,
            shortfall: None,
        }),
        (_, action) => Err(TransitionError::InvalidTransition {
            from,
            action: action.name().to_string(),
        }),
    }
}

/// Moves to `Confirmed` at `fee`, or closes the order when the balance is short.
fn settle(order: &Order, fee: Amount, balance: Amount) -> Result<Transition, TransitionError> {
    let total_price = order.food_amount.checked_add(fee)?;

    if balance < total_price {
        let mut transition = close(
            order,
            CancelReason::InsufficientBalance {
                required: total_price,
                available: balance,
            },
        );

        transition.shortfall = Some(Shortfall {
            required: total_price,
            available: balance,
        });

        return Ok(transition);
    }

    let mut next = order.clone();
    next.fee = fee;
    next.total_price = total_price;
    next.debited = Some(total_price);

    Ok(advance(
        order.status,
        next,
        OrderStatus::Confirmed,
        Effect::Debit(total_price),
    ))
}

fn close(order: &Order, reason: CancelReason) -> Transition {
    let mut next = order.clone();
    next.cancel_reason = Some(reason);

    advance(order.status, next, OrderStatus::Canceled, Effect::None)
}

fn advance(from: OrderStatus, mut next: Order, to: OrderStatus, effect: Effect) -> Transition {
    next.status = to;
    next.revision = next.revision.saturating_add(1);

    Transition {
        from,
        order: next,
        effect,
        shortfall: None,
    }
}
