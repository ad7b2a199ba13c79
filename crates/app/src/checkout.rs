//! Checkout service.
//!
//! Drives one restaurant's checkout: cart rules are checked locally first,
//! then whatever the chosen recipient mode needs is fetched, the request is
//! built and submitted, and the restaurant's cart bucket is removed once the
//! backend has accepted the order.

use std::sync::Arc;

use canteen::{
    cart::{CartError, CartStorage, CartStore},
    checkout::{
        CheckoutDraft, CheckoutError, RecipientSelection, ValidationError, build_order_request,
        validate_draft,
    },
    delivery::{ExternalRecipient, RecipientOverrides},
    money::Amount,
    orders::Order,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::gateways::{GatewayError, OrderEndpoint, ProfileService, RecipientLookup};

/// Who the caller picked to receive the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The caller; their profile is refreshed before validating.
    Myself,

    /// Another platform account.
    Registered {
        /// Username to look up
        username: String,
        /// Values typed in by the caller
        overrides: RecipientOverrides,
    },

    /// Someone without an account.
    External(ExternalRecipient),
}

/// Input for [`CheckoutService::checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutOptions {
    /// Restaurant whose cart bucket is being ordered
    pub restaurant_id: String,
    /// Ceiling for delivery, packaging and other costs
    pub authorized_fee: Amount,
    /// Note for the restaurant
    pub note: String,
    /// Recipient mode
    pub recipient: Recipient,
}

/// Checkout failures.
#[derive(Debug, Error)]
pub enum CheckoutServiceError {
    /// The attempt was refused before anything was submitted.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// The cart could not be read.
    #[error("failed to read the cart: {0}")]
    Cart(#[from] CartError),

    /// Profile refresh, recipient lookup or submission failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ValidationError> for CheckoutServiceError {
    fn from(error: ValidationError) -> Self {
        Self::Checkout(error.into())
    }
}

/// Places orders from cart buckets.
#[derive(Clone)]
pub struct CheckoutService {
    profiles: Arc<dyn ProfileService>,
    recipients: Arc<dyn RecipientLookup>,
    orders: Arc<dyn OrderEndpoint>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfileService>,
        recipients: Arc<dyn RecipientLookup>,
        orders: Arc<dyn OrderEndpoint>,
    ) -> Self {
        Self {
            profiles,
            recipients,
            orders,
        }
    }

    /// Checks out one restaurant's bucket.
    ///
    /// The cart is re-read from storage first. Broken cart rules stop the
    /// attempt before any profile refresh or recipient lookup. On success the bucket is
    /// removed and the other restaurants' buckets are left alone; on any
    /// failure the cart is untouched.
    ///
    /// # Errors
    ///
    /// - [`CheckoutServiceError::Checkout`]: a rule was broken, the profile is
    ///   incomplete or the recipient was not found. Nothing was submitted.
    /// - [`CheckoutServiceError::Gateway`]: the backend could not be reached.
    /// - [`CheckoutServiceError::Cart`]: the cart could not be read.
    pub async fn checkout<S: CartStorage>(
        &self,
        cart: &mut CartStore<S>,
        options: CheckoutOptions,
    ) -> Result<Order, CheckoutServiceError> {
        let items = cart.resync()?.slice(&options.restaurant_id).to_vec();

        let draft = CheckoutDraft {
            restaurant_id: &options.restaurant_id,
            items: &items,
            authorized_fee: options.authorized_fee,
            note: &options.note,
        };

        // External recipients need no fetch; their rules are reported with the cart's.
        if !matches!(options.recipient, Recipient::External(_)) {
            validate_draft(draft)?;
        }

        let selection = self.select(options.recipient).await?;
        let request = build_order_request(draft, selection)?;

        let order = self.orders.submit(request).await?;

        info!(
            order = %order.id,
            restaurant = %order.restaurant_id,
            total = %order.total_price,
            "order submitted"
        );

        if let Err(error) = cart.remove_restaurant(&options.restaurant_id) {
            warn!(
                order = %order.id,
                restaurant = %options.restaurant_id,
                "order placed but its cart bucket could not be removed: {error}"
            );
        }

        Ok(order)
    }

    async fn select(&self, recipient: Recipient) -> Result<RecipientSelection, GatewayError> {
        match recipient {
            Recipient::Myself => Ok(RecipientSelection::Myself(
                self.profiles.get_profile().await?,
            )),
            Recipient::Registered {
                username,
                overrides,
            } => {
                let record = self.recipients.find_by_username(&username).await?;

                Ok(RecipientSelection::Registered {
                    username,
                    record,
                    overrides,
                })
            }
            Recipient::External(recipient) => Ok(RecipientSelection::External(recipient)),
        }
    }
}
