//! Plain-text summaries of carts and orders.

use rusty_money::iso::Currency;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};

use crate::{
    cart::{Cart, LineItem},
    money::Amount,
    orders::Order,
};

/// Renders every restaurant bucket as one table.
pub fn cart_table(cart: &Cart, currency: &'static Currency) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Restaurant", "Meal", "Qty", "Unit", "Line"]);

    for (restaurant_id, items) in cart.buckets() {
        for item in items {
            push_line(&mut builder, restaurant_id, item, currency);
        }
    }

    render(builder)
}

/// Renders an order's lines followed by its money breakdown.
pub fn order_table(order: &Order, currency: &'static Currency) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Restaurant", "Meal", "Qty", "Unit", "Line"]);

    for item in &order.line_items {
        push_line(&mut builder, &order.restaurant_id, item, currency);
    }

    let mut rows: Vec<(String, Amount)> = vec![
        ("Food".to_string(), order.food_amount),
        ("Authorized fee".to_string(), order.authorized_fee),
        ("Fee".to_string(), order.fee),
    ];

    if let Some(requested) = order.requested_fee {
        let label = match order.request_description.as_deref() {
            Some(reason) => format!("Requested fee ({reason})"),
            None => "Requested fee".to_string(),
        };
        rows.push((label, requested));
    }

    rows.push(("Total".to_string(), order.total_price));

    for (label, amount) in rows {
        builder.push_record([
            String::new(),
            label,
            String::new(),
            String::new(),
            amount.display_in(currency),
        ]);
    }

    format!(
        "Order {} ({}, revision {})\n{}",
        order.id,
        order.status,
        order.revision,
        render(builder)
    )
}

fn push_line(
    builder: &mut Builder,
    restaurant_id: &str,
    item: &LineItem,
    currency: &'static Currency,
) {
    let name = if item.meal.name.is_empty() {
        item.meal_id().to_string()
    } else {
        item.meal.name.clone()
    };

    let name = if item.is_required_add_on() {
        format!("{name} (add-on)")
    } else {
        name
    };

    let line = item
        .line_total()
        .map_or_else(|_overflow| "overflow".to_string(), |total| total.display_in(currency));

    builder.push_record([
        restaurant_id.to_string(),
        name,
        item.quantity.to_string(),
        item.unit_price().display_in(currency),
        line,
    ]);
}

fn render(builder: Builder) -> String {
    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(2..5), Alignment::right());

    table.to_string()
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        cart::Meal,
        checkout::OrderRequest,
        delivery::DeliveryTarget,
        orders::{OrderAction, OrderUuid, plan},
    };

    use super::*;

    #[test]
    fn cart_table_lists_lines_per_restaurant() -> TestResult {
        let mut cart = Cart::default();
        cart.insert(Meal::new("m1", "r1", Amount::new(500)).named("Jollof"), 2)?;
        cart.insert(Meal::new("pack", "r1", Amount::new(100)).add_on(), 1)?;

        let table = cart_table(&cart, USD);

        assert!(table.contains("Jollof"), "{table}");
        assert!(table.contains("pack (add-on)"), "{table}");
        assert!(table.contains("$10.00"), "{table}");

        Ok(())
    }

    #[test]
    fn order_table_shows_requested_fee() -> TestResult {
        let order = Order::place(
            OrderUuid::now_v7(),
            "acct-1",
            OrderRequest {
                restaurant_id: "r1".to_string(),
                line_items: vec![LineItem::new(Meal::new("m1", "r1", Amount::new(1000)), 1)],
                note: String::new(),
                authorized_fee: Amount::new(1000),
                delivery: DeliveryTarget::Myself {
                    location: "Hall 3".to_string(),
                    phone: "0800".to_string(),
                    landmark: "Gate".to_string(),
                },
                total_price: Amount::new(2000),
            },
            Timestamp::UNIX_EPOCH,
        )?;

        let requested = plan(
            &order,
            &OrderAction::RequestFee {
                fee: Amount::new(1500),
                description: "rain".to_string(),
            },
            Amount::ZERO,
        )?;

        let table = order_table(&requested.order, USD);

        assert!(table.contains("fee_requested"), "{table}");
        assert!(table.contains("Requested fee (rain)"), "{table}");
        assert!(table.contains("$25.00"), "{table}");

        Ok(())
    }
}
