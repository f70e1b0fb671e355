use super::unit_of_work::{ItemWrite, RowLocks, StoreTx};
use crate::domain::catalog::{Modifier, Product, Variant};
use crate::domain::item::OrderItem;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::Payment;
use crate::domain::ports::{CatalogStore, OrderStore};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    items: HashMap<Uuid, OrderItem>,
    payments: HashMap<Uuid, Vec<Payment>>,
    sequences: HashMap<(Uuid, NaiveDate), u32>,
}

impl Tables {
    fn order_in_outlet(&self, outlet_id: Uuid, order_id: Uuid) -> Option<&Order> {
        self.orders
            .get(&order_id)
            .filter(|order| order.outlet_id == outlet_id)
    }
}

/// A thread-safe in-memory order store.
///
/// Committed rows live behind one `RwLock`; each transaction stages its
/// writes and applies them in a single write-locked step on commit, so other
/// readers never observe a half-applied unit of work.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    locks: RowLocks,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_order(&self, tx: &StoreTx, outlet_id: Uuid, order_id: Uuid) -> Option<Order> {
        if let Some(order) = tx.staged.orders.get(&order_id) {
            return (order.outlet_id == outlet_id).then(|| order.clone());
        }
        let tables = self.tables.read().await;
        tables.order_in_outlet(outlet_id, order_id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Tx = StoreTx;

    async fn begin(&self) -> Result<StoreTx> {
        Ok(StoreTx::new(self.locks.clone()))
    }

    async fn commit(&self, tx: StoreTx) -> Result<()> {
        let (staged, _guards) = tx.into_parts();
        if staged.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().await;
        for (id, order) in staged.orders {
            tables.orders.insert(id, order);
        }
        for (id, write) in staged.items {
            match write {
                ItemWrite::Put(item) => {
                    tables.items.insert(id, item);
                }
                ItemWrite::Delete(_) => {
                    tables.items.remove(&id);
                }
            }
        }
        for payment in staged.payments {
            tables
                .payments
                .entry(payment.order_id)
                .or_default()
                .push(payment);
        }
        Ok(())
    }

    async fn rollback(&self, tx: StoreTx) -> Result<()> {
        drop(tx);
        Ok(())
    }

    async fn get_order(
        &self,
        tx: &mut StoreTx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>> {
        Ok(self.read_order(tx, outlet_id, order_id).await)
    }

    async fn get_order_for_update(
        &self,
        tx: &mut StoreTx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>> {
        tx.lock_order(order_id).await;
        Ok(self.read_order(tx, outlet_id, order_id).await)
    }

    async fn insert_order(&self, tx: &mut StoreTx, order: &Order) -> Result<()> {
        tx.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&self, tx: &mut StoreTx, order: &Order) -> Result<()> {
        if !tx.holds_lock(order.id) && !tx.staged.orders.contains_key(&order.id) {
            return Err(OrderError::internal(
                "order updated without holding its row lock",
            ));
        }
        tx.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order_status(
        &self,
        tx: &mut StoreTx,
        outlet_id: Uuid,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        tx.lock_order(order_id).await;
        let Some(mut order) = self.read_order(tx, outlet_id, order_id).await else {
            return Ok(false);
        };
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        order.updated_at = at;
        tx.staged.orders.insert(order_id, order);
        Ok(true)
    }

    async fn next_order_sequence(
        &self,
        _tx: &mut StoreTx,
        outlet_id: Uuid,
        day: NaiveDate,
    ) -> Result<u32> {
        // Allocated outside the unit of work, like a database sequence.
        let mut tables = self.tables.write().await;
        let seq = tables.sequences.entry((outlet_id, day)).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn list_items(&self, tx: &mut StoreTx, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let committed: Vec<OrderItem> = {
            let tables = self.tables.read().await;
            tables
                .items
                .values()
                .filter(|item| item.order_id == order_id)
                .cloned()
                .collect()
        };
        Ok(tx.staged.merge_items(order_id, committed))
    }

    async fn get_item(
        &self,
        tx: &mut StoreTx,
        outlet_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<OrderItem>> {
        let item = match tx.staged.items.get(&item_id) {
            Some(ItemWrite::Put(item)) => Some(item.clone()),
            Some(ItemWrite::Delete(_)) => None,
            None => self.tables.read().await.items.get(&item_id).cloned(),
        };
        let Some(item) = item else {
            return Ok(None);
        };
        let in_outlet = self
            .read_order(tx, outlet_id, item.order_id)
            .await
            .is_some();
        Ok(in_outlet.then_some(item))
    }

    async fn insert_item(&self, tx: &mut StoreTx, item: &OrderItem) -> Result<()> {
        tx.staged
            .items
            .insert(item.id, ItemWrite::Put(item.clone()));
        Ok(())
    }

    async fn update_item(&self, tx: &mut StoreTx, item: &OrderItem) -> Result<()> {
        tx.staged
            .items
            .insert(item.id, ItemWrite::Put(item.clone()));
        Ok(())
    }

    async fn delete_item(&self, tx: &mut StoreTx, item: &OrderItem) -> Result<()> {
        tx.staged
            .items
            .insert(item.id, ItemWrite::Delete(item.clone()));
        Ok(())
    }

    async fn list_payments(&self, tx: &mut StoreTx, order_id: Uuid) -> Result<Vec<Payment>> {
        let committed = {
            let tables = self.tables.read().await;
            tables.payments.get(&order_id).cloned().unwrap_or_default()
        };
        Ok(tx.staged.merge_payments(order_id, committed))
    }

    async fn insert_payment(&self, tx: &mut StoreTx, payment: &Payment) -> Result<()> {
        tx.staged.payments.push(payment.clone());
        Ok(())
    }
}

/// Serializable catalog contents, used to seed an [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

#[derive(Default)]
struct CatalogTables {
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, Variant>,
    modifiers: HashMap<Uuid, Modifier>,
}

/// A thread-safe in-memory catalog.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    tables: Arc<RwLock<CatalogTables>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let tables = CatalogTables {
            products: snapshot.products.into_iter().map(|p| (p.id, p)).collect(),
            variants: snapshot.variants.into_iter().map(|v| (v.id, v)).collect(),
            modifiers: snapshot.modifiers.into_iter().map(|m| (m.id, m)).collect(),
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    pub async fn put_product(&self, product: Product) {
        self.tables
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    pub async fn put_variant(&self, variant: Variant) {
        self.tables
            .write()
            .await
            .variants
            .insert(variant.id, variant);
    }

    pub async fn put_modifier(&self, modifier: Modifier) {
        self.tables
            .write()
            .await
            .modifiers
            .insert(modifier.id, modifier);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_product(&self, outlet_id: Uuid, product_id: Uuid) -> Result<Product> {
        let tables = self.tables.read().await;
        tables
            .products
            .get(&product_id)
            .filter(|p| p.outlet_id == outlet_id)
            .cloned()
            .ok_or_else(|| OrderError::not_found(format!("product {product_id} not found")))
    }

    async fn get_variant(
        &self,
        outlet_id: Uuid,
        product_id: Uuid,
        variant_id: Uuid,
    ) -> Result<Variant> {
        let tables = self.tables.read().await;
        let owned = tables
            .products
            .get(&product_id)
            .is_some_and(|p| p.outlet_id == outlet_id);
        tables
            .variants
            .get(&variant_id)
            .filter(|v| owned && v.product_id == product_id)
            .cloned()
            .ok_or_else(|| {
                OrderError::not_found(format!(
                    "variant {variant_id} not found for product {product_id}"
                ))
            })
    }

    async fn get_modifier(
        &self,
        outlet_id: Uuid,
        product_id: Uuid,
        modifier_id: Uuid,
    ) -> Result<Modifier> {
        let tables = self.tables.read().await;
        let owned = tables
            .products
            .get(&product_id)
            .is_some_and(|p| p.outlet_id == outlet_id);
        tables
            .modifiers
            .get(&modifier_id)
            .filter(|m| owned && m.product_id == product_id)
            .cloned()
            .ok_or_else(|| {
                OrderError::not_found(format!(
                    "modifier {modifier_id} not found for product {product_id}"
                ))
            })
    }
}
