//! Persisted cart document.
//!
//! The document is a JSON object keyed by restaurant identifier, each value an
//! array of `{ "meal": {..}, "quantity": n }` entries. Encoding is
//! deterministic (sorted keys, fixed field order) so that re-saving a freshly
//! decoded cart reproduces the stored bytes.
//!
//! Decoding never fails: entries without a meal object, with a quantity that
//! is not a positive integer, or filed under the wrong restaurant are dropped
//! with a warning, and so are buckets left empty.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::{Cart, LineItem, Meal};

/// Serialises a cart.
///
/// # Errors
///
/// Returns a serialisation error; with the types involved this does not
/// happen in practice.
pub fn encode(cart: &Cart) -> Result<String, serde_json::Error> {
    serde_json::to_string(cart.buckets())
}

/// Deserialises a cart, discarding anything malformed.
pub fn decode(raw: &str) -> Cart {
    let document = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(document)) => document,
        Ok(other) => {
            warn!(kind = value_kind(&other), "discarding cart document that is not an object");
            return Cart::default();
        }
        Err(error) => {
            warn!(%error, "discarding unreadable cart document");
            return Cart::default();
        }
    };

    Cart::from_buckets(decode_buckets(document))
}

fn decode_buckets(document: Map<String, Value>) -> BTreeMap<String, Vec<LineItem>> {
    let mut buckets = BTreeMap::new();

    for (restaurant_id, entries) in document {
        let Value::Array(entries) = entries else {
            warn!(restaurant = %restaurant_id, "discarding cart bucket that is not a list");
            continue;
        };

        let mut bucket: Vec<LineItem> = Vec::with_capacity(entries.len());

        for entry in entries {
            let Some(item) = decode_line(&restaurant_id, entry) else {
                continue;
            };

            match bucket.iter_mut().find(|line| line.meal.id == item.meal.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => bucket.push(item),
            }
        }

        if !bucket.is_empty() {
            buckets.insert(restaurant_id, bucket);
        }
    }

    buckets
}

fn decode_line(restaurant_id: &str, mut entry: Value) -> Option<LineItem> {
    let quantity = entry
        .get("quantity")
        .and_then(Value::as_u64)
        .and_then(|quantity| u32::try_from(quantity).ok())
        .filter(|quantity| *quantity > 0);

    let Some(quantity) = quantity else {
        warn!(restaurant = restaurant_id, "discarding cart entry with invalid quantity");
        return None;
    };

    let meal = entry
        .get_mut("meal")
        .map(Value::take)
        .and_then(|meal| serde_json::from_value::<Meal>(meal).ok());

    let Some(meal) = meal else {
        warn!(restaurant = restaurant_id, "discarding cart entry without a meal");
        return None;
    };

    if meal.restaurant_id != restaurant_id {
        warn!(
            restaurant = restaurant_id,
            meal = %meal.id,
            owner = %meal.restaurant_id,
            "discarding cart entry filed under the wrong restaurant"
        );
        return None;
    }

    Some(LineItem::new(meal, quantity))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use crate::money::Amount;

    use super::*;

    fn sample_cart() -> Result<Cart, crate::cart::CartError> {
        let mut cart = Cart::default();
        cart.insert(Meal::new("m1", "r1", Amount::new(500)).named("Jollof"), 2)?;
        cart.insert(Meal::new("pack", "r1", Amount::new(100)).add_on(), 1)?;
        cart.insert(Meal::new("m9", "r2", Amount::new(750)), 1)?;
        Ok(cart)
    }

    #[test]
    fn save_of_load_is_byte_stable() -> TestResult {
        let stored = encode(&sample_cart()?)?;

        let reloaded = decode(&stored);

        assert_eq!(encode(&reloaded)?, stored);
        assert_eq!(encode(&decode(&encode(&reloaded)?))?, stored);

        Ok(())
    }

    #[test]
    fn drops_entries_without_meal() {
        let raw = json!({
            "r1": [
                { "quantity": 2 },
                { "meal": { "id": "m1", "restaurant_id": "r1", "price": 500 }, "quantity": 1 }
            ]
        })
        .to_string();

        let cart = decode(&raw);

        assert_eq!(cart.slice("r1").len(), 1);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn drops_non_numeric_and_zero_quantities() {
        let meal = json!({ "id": "m1", "restaurant_id": "r1", "price": 500 });
        let raw = json!({
            "r1": [
                { "meal": meal, "quantity": "2" },
                { "meal": meal, "quantity": 0 },
                { "meal": meal, "quantity": 1.5 }
            ]
        })
        .to_string();

        let cart = decode(&raw);

        assert!(cart.is_empty(), "every entry was corrupt, so no bucket remains");
    }

    #[test]
    fn drops_entries_under_wrong_restaurant() {
        let raw = json!({
            "r1": [{ "meal": { "id": "m1", "restaurant_id": "r2", "price": 500 }, "quantity": 1 }]
        })
        .to_string();

        assert!(decode(&raw).is_empty());
    }

    #[test]
    fn unreadable_document_is_empty() {
        assert!(decode("{not json").is_empty());
        assert!(decode("[1, 2, 3]").is_empty());
    }

    #[test]
    fn duplicate_meals_are_merged() {
        let meal = json!({ "id": "m1", "restaurant_id": "r1", "price": 500 });
        let raw = json!({ "r1": [{ "meal": meal, "quantity": 1 }, { "meal": meal, "quantity": 2 }] })
            .to_string();

        let cart = decode(&raw);

        assert_eq!(cart.slice("r1").len(), 1);
        assert_eq!(cart.item_count(), 3);
    }
}
