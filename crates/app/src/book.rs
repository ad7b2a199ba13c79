//! Order book
//!
//! The client's read view of the orders it is following. Server snapshots
//! replace local ones wholesale; nothing is merged field by field and no
//! status is ever advanced locally. Responses can arrive out of order, so a
//! snapshot older than the one already held is dropped, as is any snapshot
//! for an order the client has stopped following.

use canteen::orders::{Order, OrderUuid};
use rustc_hash::FxHashMap;
use tracing::debug;

/// What happened to a snapshot handed to [`OrderBook::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The snapshot is now the local view.
    Replaced,
    /// A newer revision is already held.
    Stale {
        /// Revision held locally
        held: u64,
        /// Revision received
        received: u64,
    },
    /// The order is not being followed.
    Untracked,
}

/// Latest known snapshot per followed order.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: FxHashMap<OrderUuid, Order>,
}

impl OrderBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts following an order, or refreshes it if the snapshot is newer.
    pub fn track(&mut self, order: Order) {
        match self.orders.get(&order.id) {
            Some(held) if held.revision > order.revision => {}
            _ => {
                self.orders.insert(order.id, order);
            }
        }
    }

    /// Stops following an order. Late responses for it will be discarded.
    pub fn forget(&mut self, id: OrderUuid) -> Option<Order> {
        self.orders.remove(&id)
    }

    /// Applies a snapshot received from the backend.
    pub fn reconcile(&mut self, snapshot: Order) -> Reconciled {
        let Some(held) = self.orders.get_mut(&snapshot.id) else {
            debug!(order = %snapshot.id, "discarding snapshot for untracked order");
            return Reconciled::Untracked;
        };

        if snapshot.revision < held.revision {
            debug!(
                order = %snapshot.id,
                held = held.revision,
                received = snapshot.revision,
                "discarding stale snapshot"
            );
            return Reconciled::Stale {
                held: held.revision,
                received: snapshot.revision,
            };
        }

        *held = snapshot;

        Reconciled::Replaced
    }

    /// The local view of an order.
    pub fn get(&self, id: OrderUuid) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Followed orders, newest first.
    pub fn orders(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        orders
    }

    /// Number of followed orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether no orders are followed.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use canteen::{
        cart::{LineItem, Meal},
        checkout::OrderRequest,
        delivery::DeliveryTarget,
        money::Amount,
        orders::{OrderAction, OrderStatus, plan},
    };
    use jiff::Timestamp;
    use testresult::TestResult;

    use super::*;

    fn pending() -> Result<Order, Box<dyn std::error::Error>> {
        Ok(Order::place(
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
        )?)
    }

    #[test]
    fn newer_snapshot_replaces_wholesale() -> TestResult {
        let order = pending()?;
        let confirmed = plan(&order, &OrderAction::Confirm { fee: None }, Amount::new(5000))?.order;

        let mut book = OrderBook::new();
        book.track(order.clone());

        assert_eq!(book.reconcile(confirmed.clone()), Reconciled::Replaced);
        assert_eq!(book.get(order.id), Some(&confirmed));

        Ok(())
    }

    #[test]
    fn late_older_snapshot_is_discarded() -> TestResult {
        let order = pending()?;
        let confirmed = plan(&order, &OrderAction::Confirm { fee: None }, Amount::new(5000))?.order;

        let mut book = OrderBook::new();
        book.track(confirmed.clone());

        let result = book.reconcile(order);

        assert_eq!(result, Reconciled::Stale { held: 1, received: 0 });
        assert_eq!(
            book.get(confirmed.id).map(|held| held.status),
            Some(OrderStatus::Confirmed)
        );

        Ok(())
    }

    #[test]
    fn snapshots_for_forgotten_orders_are_dropped() -> TestResult {
        let order = pending()?;
        let mut book = OrderBook::new();

        book.track(order.clone());
        book.forget(order.id);

        assert_eq!(book.reconcile(order), Reconciled::Untracked);
        assert!(book.is_empty());

        Ok(())
    }

    #[test]
    fn tracking_never_rolls_back() -> TestResult {
        let order = pending()?;
        let confirmed = plan(&order, &OrderAction::Confirm { fee: None }, Amount::new(5000))?.order;

        let mut book = OrderBook::new();
        book.track(confirmed.clone());
        book.track(order);

        assert_eq!(book.get(confirmed.id), Some(&confirmed));
        assert_eq!(book.len(), 1);

        Ok(())
    }
}
