//! Delivery targets and the records they are resolved from.

use serde::{Deserialize, Serialize};

use crate::money::Amount;

/// Where and to whom an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryTarget {
    /// The orderer, using their stored profile.
    #[serde(rename = "self")]
    Myself {
        /// Delivery location
        location: String,
        /// Contact phone
        phone: String,
        /// Landmark near the location
        landmark: String,
    },

    /// Another platform account, looked up by username.
    Registered {
        /// Recipient username
        username: String,
        /// Effective delivery location
        location: String,
        /// Effective contact phone
        phone: String,
        /// Effective landmark
        landmark: String,
    },

    /// Someone without a platform account.
    External(ExternalRecipient),
}

impl DeliveryTarget {
    /// Short name of the recipient mode.
    pub fn mode(&self) -> &'static str {
        match self {
            DeliveryTarget::Myself { .. } => "self",
            DeliveryTarget::Registered { .. } => "registered",
            DeliveryTarget::External(_) => "external",
        }
    }

    /// The delivery location, whatever the mode.
    pub fn location(&self) -> &str {
        match self {
            DeliveryTarget::Myself { location, .. }
            | DeliveryTarget::Registered { location, .. } => location,
            DeliveryTarget::External(recipient) => &recipient.location,
        }
    }
}

/// A recipient who is not a platform account. No balance or history is tied
/// to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecipient {
    /// Full name
    pub name: String,
    /// Contact phone
    pub phone: String,
    /// Optional email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Delivery location
    pub location: String,
    /// Optional landmark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
}

/// The caller's own profile, as returned by the profile service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProfile {
    /// Delivery location
    #[serde(default)]
    pub location: String,
    /// Contact phone
    #[serde(default)]
    pub phone: String,
    /// Landmark near the location
    #[serde(default)]
    pub landmark: String,
    /// Last known wallet balance, for display only
    #[serde(default)]
    pub wallet_balance: Amount,
}

/// What a username lookup returns for a registered recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    /// Recipient username
    pub username: String,
    /// Stored location
    #[serde(default)]
    pub location: Option<String>,
    /// Stored phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Stored landmark
    #[serde(default)]
    pub landmark: Option<String>,
    /// Whether the stored delivery details are complete
    #[serde(default)]
    pub has_complete_delivery_info: bool,
}

/// Fields the orderer typed in to replace a recipient's stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientOverrides {
    /// Replacement location
    #[serde(default)]
    pub location: Option<String>,
    /// Replacement phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Replacement landmark
    #[serde(default)]
    pub landmark: Option<String>,
}

/// The override when it has content, otherwise the stored value, otherwise empty.
pub(crate) fn effective(over: Option<&str>, stored: Option<&str>) -> String {
    over.map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| stored.map(str::trim))
        .unwrap_or_default()
        .to_string()
}
