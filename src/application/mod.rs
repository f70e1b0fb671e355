//! Application layer orchestrating the order and payment operations.
//!
//! [`engine::OrderEngine`] is the single entry point. Its operations are
//! split by concern: order reads and status transitions live in `engine`,
//! cart mutations in `mutation`, and payment reconciliation in `payment`.

pub mod commands;
pub mod engine;
pub mod mutation;
pub mod payment;
