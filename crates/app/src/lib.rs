//! Canteen client services: backend collaborators, checkout and order
//! operations, and the plumbing the `canteen` binary is built from.

pub mod book;
pub mod checkout;
pub mod config;
pub mod context;
pub mod gateways;
pub mod http;
pub mod local;
pub mod observability;
pub mod orders;
