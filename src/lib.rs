//! Canteen
//!
//! Canteen is the order engine behind a campus food-delivery storefront: a
//! multi-restaurant cart, checkout validation, and the order lifecycle with
//! its fee-negotiation protocol and wallet settlement.

pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod money;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod settlement;
pub mod summary;
pub mod uuids;
