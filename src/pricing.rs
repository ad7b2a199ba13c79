//! Pricing

use crate::{
    cart::LineItem,
    money::{Amount, AmountError},
};

/// Calculates the food amount of a list of line items: `Σ(unit price × quantity)`.
///
/// An empty list totals zero. Fees are never included.
///
/// # Errors
///
/// - [`AmountError::Overflow`]: the total does not fit in minor units.
pub fn food_amount(items: &[LineItem]) -> Result<Amount, AmountError> {
    items.iter().try_fold(Amount::ZERO, |acc, item| {
        acc.checked_add(item.line_total()?)
    })
}

/// Calculates the price of an order: food amount plus fee.
///
/// # Errors
///
/// - [`AmountError::Overflow`]: the total does not fit in minor units.
pub fn total_price(items: &[LineItem], fee: Amount) -> Result<Amount, AmountError> {
    food_amount(items)?.checked_add(fee)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::cart::Meal;

    use super::*;

    fn line(id: &str, price: u64, quantity: u32) -> LineItem {
        LineItem::new(Meal::new(id, "r1", Amount::new(price)), quantity)
    }

    #[test]
    fn test_food_amount() -> TestResult {
        let items = [line("m1", 500, 2), line("m2", 250, 1)];

        assert_eq!(food_amount(&items)?, Amount::new(1250));

        Ok(())
    }

    #[test]
    fn test_food_amount_empty() -> TestResult {
        assert_eq!(food_amount(&[])?, Amount::ZERO);

        Ok(())
    }

    #[test]
    fn test_total_price_adds_fee() -> TestResult {
        let items = [line("m1", 500, 2)];

        assert_eq!(total_price(&items, Amount::new(1000))?, Amount::new(2000));

        Ok(())
    }

    #[test]
    fn test_food_amount_overflow() {
        let items = [line("m1", u64::MAX, 2)];

        assert_eq!(food_amount(&items), Err(AmountError::Overflow));
    }
}
