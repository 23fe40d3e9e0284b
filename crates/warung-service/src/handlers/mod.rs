//! API handlers.

pub mod ai;
pub mod analytics;
pub mod health;
pub mod products;
pub mod transactions;
