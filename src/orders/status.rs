//! Order status.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status string that matches no known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised order status {0:?}")]
pub struct UnknownStatus(pub String);

/// Where an order is in its lifecycle.
///
/// Backends have been seen sending `"Confirmed"`, `"confirmed"` and
/// `"Fee Requested"` for the same states, so parsing ignores case and
/// separators. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum OrderStatus {
    /// Placed, waiting for the restaurant.
    Pending,
    /// Restaurant asked for a fee above the authorized ceiling.
    FeeRequested,
    /// Accepted and paid.
    Confirmed,
    /// Handed over.
    Delivered,
    /// Closed without delivery.
    Canceled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Canceled)
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::FeeRequested => "fee_requested",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.pad(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "feerequested" => Ok(OrderStatus::FeeRequested),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "delivered" => Ok(OrderStatus::Delivered),
            "canceled" | "cancelled" => Ok(OrderStatus::Canceled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
