//! Cart
//!
//! A multi-restaurant cart: one bucket of line items per restaurant. The
//! [`CartStore`] owns the in-memory view and keeps it in step with a durable
//! [`CartStorage`] using read-merge-write on every mutation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    money::{Amount, AmountError},
    pricing,
};

pub mod codec;
pub mod storage;

pub use storage::{CartStorage, CartStorageError, FileCartStorage, MemoryCartStorage};

/// Errors raised by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The meal does not name the restaurant it belongs to.
    #[error("meal {0} has no restaurant")]
    MissingRestaurant(String),

    /// Items are added with a quantity of at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Summing quantities overflowed.
    #[error("quantity overflow for meal {0}")]
    QuantityOverflow(String),

    /// No bucket holds the given meal.
    #[error("meal {0} is not in the cart")]
    ItemNotFound(String),

    /// Durable storage failed.
    #[error(transparent)]
    Storage(#[from] CartStorageError),
}

/// A meal as referenced from a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    /// Meal identifier
    pub id: String,

    /// Owning restaurant identifier
    pub restaurant_id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Unit price
    pub price: Amount,

    /// Packaging and similar add-ons that cannot be ordered on their own.
    #[serde(default)]
    pub required_add_on: bool,
}

impl Meal {
    /// Creates a meal that is not an add-on.
    pub fn new(id: impl Into<String>, restaurant_id: impl Into<String>, price: Amount) -> Self {
        Self {
            id: id.into(),
            restaurant_id: restaurant_id.into(),
            name: String::new(),
            price,
            required_add_on: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the meal as an add-on.
    #[must_use]
    pub fn add_on(mut self) -> Self {
        self.required_add_on = true;
        self
    }
}

/// A cart line: a meal and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// The referenced meal
    pub meal: Meal,

    /// Always at least one
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(meal: Meal, quantity: u32) -> Self {
        Self { meal, quantity }
    }

    /// Meal identifier.
    pub fn meal_id(&self) -> &str {
        &self.meal.id
    }

    /// Restaurant identifier.
    pub fn restaurant_id(&self) -> &str {
        &self.meal.restaurant_id
    }

    /// Unit price.
    pub fn unit_price(&self) -> Amount {
        self.meal.price
    }

    /// Whether the line is an add-on.
    pub fn is_required_add_on(&self) -> bool {
        self.meal.required_add_on
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the product does not fit.
    pub fn line_total(&self) -> Result<Amount, AmountError> {
        self.meal.price.checked_mul(self.quantity)
    }
}

/// Restaurant buckets keyed by restaurant identifier.
///
/// A bucket is never empty: removing its last line removes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    restaurants: BTreeMap<String, Vec<LineItem>>,
}

impl Cart {
    /// Returns true when no restaurant has any line.
    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }

    /// Restaurant identifiers with at least one line.
    pub fn restaurants(&self) -> impl Iterator<Item = &str> {
        self.restaurants.keys().map(String::as_str)
    }

    /// Lines for one restaurant, in display order.
    pub fn slice(&self, restaurant_id: &str) -> &[LineItem] {
        self.restaurants
            .get(restaurant_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Every bucket.
    pub fn buckets(&self) -> &BTreeMap<String, Vec<LineItem>> {
        &self.restaurants
    }

    /// Total quantity across every bucket.
    pub fn item_count(&self) -> u64 {
        self.restaurants
            .values()
            .flatten()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Food amount for one restaurant, excluding any fee.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the total does not fit.
    pub fn subtotal(&self, restaurant_id: &str) -> Result<Amount, AmountError> {
        pricing::food_amount(self.slice(restaurant_id))
    }

    /// Adds a meal, summing quantities when the meal is already present.
    ///
    /// # Errors
    ///
    /// Returns an error when the meal has no restaurant, the quantity is zero
    /// or the summed quantity overflows.
    pub fn insert(&mut self, meal: Meal, quantity: u32) -> Result<(), CartError> {
        if meal.restaurant_id.trim().is_empty() {
            return Err(CartError::MissingRestaurant(meal.id));
        }

        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let bucket = self
            .restaurants
            .entry(meal.restaurant_id.clone())
            .or_default();

        if let Some(existing) = bucket.iter_mut().find(|item| item.meal.id == meal.id) {
            existing.quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| CartError::QuantityOverflow(meal.id.clone()))?;
        } else {
            bucket.push(LineItem::new(meal, quantity));
        }

        Ok(())
    }

    /// Replaces the quantity of a meal in whichever bucket holds it.
    ///
    /// A quantity of zero or less removes the meal, like [`Cart::remove_meal`],
    /// and succeeds even when no bucket holds it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] when a positive quantity is set on
    /// a meal no bucket holds, and
    /// [`CartError::QuantityOverflow`] when the quantity does not fit.
    pub fn set_quantity(&mut self, meal_id: &str, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove_meal(meal_id);
            return Ok(());
        }

        let quantity = u32::try_from(quantity)
            .ok()
            .ok_or_else(|| CartError::QuantityOverflow(meal_id.to_string()))?;

        let mut found = false;

        for item in self.restaurants.values_mut().flatten() {
            if item.meal.id == meal_id {
                item.quantity = quantity;
                found = true;
            }
        }

        if found {
            Ok(())
        } else {
            Err(CartError::ItemNotFound(meal_id.to_string()))
        }
    }

    /// Removes a meal from every bucket. Returns whether anything was removed.
    pub fn remove_meal(&mut self, meal_id: &str) -> bool {
        let mut removed = false;

        for bucket in self.restaurants.values_mut() {
            let before = bucket.len();
            bucket.retain(|item| item.meal.id != meal_id);
            removed |= bucket.len() != before;
        }

        self.restaurants.retain(|_, bucket| !bucket.is_empty());

        removed
    }

    /// Removes a whole restaurant bucket. Returns whether it existed.
    pub fn remove_restaurant(&mut self, restaurant_id: &str) -> bool {
        self.restaurants.remove(restaurant_id).is_some()
    }

    pub(crate) fn from_buckets(restaurants: BTreeMap<String, Vec<LineItem>>) -> Self {
        let mut cart = Cart { restaurants };
        cart.restaurants.retain(|_, bucket| !bucket.is_empty());
        cart
    }
}

/// Owns the cart view and persists every mutation.
///
/// Each mutation re-reads the durable copy first, applies the change to what
/// was read and writes it back, so buckets written by another context since
/// the last read survive. Only the buckets a mutation touches are affected.
#[derive(Debug)]
pub struct CartStore<S: CartStorage> {
    storage: S,
    cart: Cart,
}

impl<S: CartStorage> CartStore<S> {
    /// Opens a store, loading whatever the storage holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub fn open(storage: S) -> Result<Self, CartError> {
        let cart = storage.load()?;

        Ok(Self { storage, cart })
    }

    /// The last synchronised view.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Re-reads the durable copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub fn resync(&mut self) -> Result<&Cart, CartError> {
        self.cart = self.storage.load()?;

        Ok(&self.cart)
    }

    /// Adds `quantity` of a meal.
    ///
    /// # Errors
    ///
    /// See [`Cart::insert`]; storage failures are also returned.
    pub fn add_item(&mut self, meal: Meal, quantity: u32) -> Result<(), CartError> {
        debug!(meal = %meal.id, restaurant = %meal.restaurant_id, quantity, "adding cart item");

        self.mutate(|cart| cart.insert(meal, quantity))
    }

    /// Sets the quantity of a meal; zero or less removes it.
    ///
    /// # Errors
    ///
    /// See [`Cart::set_quantity`]; storage failures are also returned.
    pub fn update_quantity(&mut self, meal_id: &str, quantity: i64) -> Result<(), CartError> {
        debug!(meal = meal_id, quantity, "updating cart item quantity");

        self.mutate(|cart| cart.set_quantity(meal_id, quantity))
    }

    /// Removes a meal from every bucket.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn remove_item(&mut self, meal_id: &str) -> Result<(), CartError> {
        debug!(meal = meal_id, "removing cart item");

        self.mutate(|cart| {
            cart.remove_meal(meal_id);
            Ok(())
        })
    }

    /// Removes a restaurant's bucket, e.g. after that restaurant was checked out.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn remove_restaurant(&mut self, restaurant_id: &str) -> Result<(), CartError> {
        debug!(restaurant = restaurant_id, "removing cart bucket");

        self.mutate(|cart| {
            cart.remove_restaurant(restaurant_id);
            Ok(())
        })
    }

    /// Empties the cart and drops the durable copy.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub fn clear(&mut self) -> Result<(), CartError> {
        debug!("clearing cart");

        self.storage.clear()?;
        self.cart = Cart::default();

        Ok(())
    }

    /// Total quantity across every bucket.
    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    /// Food amount for one restaurant, excluding any fee.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::Overflow`] if the total does not fit.
    pub fn subtotal(&self, restaurant_id: &str) -> Result<Amount, AmountError> {
        self.cart.subtotal(restaurant_id)
    }

    /// The underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn mutate<F>(&mut self, change: F) -> Result<(), CartError>
    where
        F: FnOnce(&mut Cart) -> Result<(), CartError>,
    {
        let mut fresh = self.storage.load()?;

        change(&mut fresh)?;

        if fresh.is_empty() {
            self.storage.clear()?;
        } else {
            self.storage.save(&fresh)?;
        }

        self.cart = fresh;

        Ok(())
    }
}
