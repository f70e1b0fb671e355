//! Domain model: money, catalog records, orders, items, payments, the state
//! machines that govern them, and the storage ports the application drives.

pub mod catalog;
pub mod catering;
pub mod item;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
pub mod pricing;
