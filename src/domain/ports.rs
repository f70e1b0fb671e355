use super::catalog::{Modifier, Product, Variant};
use super::item::OrderItem;
use super::order::{Order, OrderStatus};
use super::payment::Payment;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Read-only catalog lookups, scoped by outlet.
///
/// Each lookup fails with `OrderError::NotFound` when the record is missing,
/// belongs to another outlet, or (for variants and modifiers) belongs to a
/// different product than the one claimed.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, outlet_id: Uuid, product_id: Uuid) -> Result<Product>;
    async fn get_variant(&self, outlet_id: Uuid, product_id: Uuid, variant_id: Uuid)
    -> Result<Variant>;
    async fn get_modifier(
        &self,
        outlet_id: Uuid,
        product_id: Uuid,
        modifier_id: Uuid,
    ) -> Result<Modifier>;
}

pub type CatalogStoreBox = Box<dyn CatalogStore>;

/// Transactional storage for orders, items and payments.
///
/// Every data method takes the unit of work opened by [`OrderStore::begin`].
/// Writes become visible to other units of work only on commit. Dropping a
/// transaction without committing discards its writes and releases its locks.
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> Result<()>;
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;

    /// Reads an order without locking it.
    async fn get_order(&self, tx: &mut Self::Tx, outlet_id: Uuid, order_id: Uuid)
    -> Result<Option<Order>>;

    /// Takes the exclusive row lock on the order, then reads it. Blocks while
    /// another unit of work holds the lock.
    async fn get_order_for_update(
        &self,
        tx: &mut Self::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>>;

    async fn insert_order(&self, tx: &mut Self::Tx, order: &Order) -> Result<()>;
    async fn update_order(&self, tx: &mut Self::Tx, order: &Order) -> Result<()>;

    /// Compare-and-swap on the order status. Returns `false` when the stored
    /// status no longer equals `expected` (zero rows affected).
    async fn update_order_status(
        &self,
        tx: &mut Self::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Allocates the next per-outlet, per-day order sequence number.
    async fn next_order_sequence(
        &self,
        tx: &mut Self::Tx,
        outlet_id: Uuid,
        day: NaiveDate,
    ) -> Result<u32>;

    async fn list_items(&self, tx: &mut Self::Tx, order_id: Uuid) -> Result<Vec<OrderItem>>;
    async fn get_item(&self, tx: &mut Self::Tx, outlet_id: Uuid, item_id: Uuid)
    -> Result<Option<OrderItem>>;
    async fn insert_item(&self, tx: &mut Self::Tx, item: &OrderItem) -> Result<()>;
    async fn update_item(&self, tx: &mut Self::Tx, item: &OrderItem) -> Result<()>;
    /// Deletes the item together with its modifiers.
    async fn delete_item(&self, tx: &mut Self::Tx, item: &OrderItem) -> Result<()>;

    async fn list_payments(&self, tx: &mut Self::Tx, order_id: Uuid) -> Result<Vec<Payment>>;
    async fn insert_payment(&self, tx: &mut Self::Tx, payment: &Payment) -> Result<()>;
}
