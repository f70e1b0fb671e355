use super::unit_of_work::{ItemWrite, RowLocks, StoreTx};
use crate::domain::item::OrderItem;
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::Payment;
use crate::domain::ports::OrderStore;
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for order rows, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for items, keyed by `order_id ++ item_id`.
pub const CF_ITEMS: &str = "items";
/// Column Family mapping `item_id -> order_id`.
pub const CF_ITEM_INDEX: &str = "item_index";
/// Column Family for payments, keyed by `order_id ++ payment_id`.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for order-number sequences, keyed by `outlet_id ++ day`.
pub const CF_COUNTERS: &str = "counters";

const COLUMN_FAMILIES: [&str; 5] = [CF_ORDERS, CF_ITEMS, CF_ITEM_INDEX, CF_PAYMENTS, CF_COUNTERS];

/// A persistent order store backed by RocksDB.
///
/// Row locks are process-local, so one database must be opened by one
/// process at a time (RocksDB enforces this with its own lock file). Commits
/// write all staged rows in one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbOrderStore {
    db: Arc<DB>,
    locks: RowLocks,
    counters: Arc<Mutex<()>>,
}

impl RocksDbOrderStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: RowLocks::new(),
            counters: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| OrderError::internal(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));

        let mut rows = Vec::new();
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn committed_order(&self, outlet_id: Uuid, order_id: Uuid) -> Result<Option<Order>> {
        let order: Option<Order> = self.get_json(CF_ORDERS, order_id.as_bytes())?;
        Ok(order.filter(|o| o.outlet_id == outlet_id))
    }

    fn read_order(&self, tx: &StoreTx, outlet_id: Uuid, order_id: Uuid) -> Result<Option<Order>> {
        if let Some(order) = tx.staged.orders.get(&order_id) {
            return Ok((order.outlet_id == outlet_id).then(|| order.clone()));
        }
        self.committed_order(outlet_id, order_id)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }
}

fn compound_key(a: Uuid, b: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(a.as_bytes());
    key.extend_from_slice(b.as_bytes());
    key
}

fn counter_key(outlet_id: Uuid, day: NaiveDate) -> Vec<u8> {
    let mut key = outlet_id.as_bytes().to_vec();
    key.extend_from_slice(day.format("%Y%m%d").to_string().as_bytes());
    key
}

#[async_trait]
impl OrderStore for RocksDbOrderStore {
    type Tx = StoreTx;

    async fn begin(&self) -> Result<StoreTx> {
        Ok(StoreTx::new(self.locks.clone()))
    }

    async fn commit(&self, tx: StoreTx) -> Result<()> {
        let (staged, _guards) = tx.into_parts();
        if staged.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        for order in staged.orders.values() {
            self.put_json(&mut batch, CF_ORDERS, order.id.as_bytes(), order)?;
        }
        for write in staged.items.values() {
            let item = write.item();
            let key = compound_key(item.order_id, item.id);
            match write {
                ItemWrite::Put(item) => {
                    self.put_json(&mut batch, CF_ITEMS, &key, item)?;
                    batch.put_cf(
                        self.cf(CF_ITEM_INDEX)?,
                        item.id.as_bytes(),
                        item.order_id.as_bytes(),
                    );
                }
                ItemWrite::Delete(item) => {
                    batch.delete_cf(self.cf(CF_ITEMS)?, &key);
                    batch.delete_cf(self.cf(CF_ITEM_INDEX)?, item.id.as_bytes());
                }
            }
        }
        for payment in &staged.payments {
            let key = compound_key(payment.order_id, payment.id);
            self.put_json(&mut batch, CF_PAYMENTS, &key, payment)?;
        }

        self.db.write(batch)?;
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
        self.read_order(tx, outlet_id, order_id)
    }

    async fn get_order_for_update(
        &self,
        tx: &mut StoreTx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>> {
        tx.lock_order(order_id).await;
        self.read_order(tx, outlet_id, order_id)
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
        let Some(mut order) = self.read_order(tx, outlet_id, order_id)? else {
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
        let _guard = self.counters.lock().await;
        let key = counter_key(outlet_id, day);
        let current = match self.db.get_cf(self.cf(CF_COUNTERS)?, &key)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| OrderError::internal("corrupt order sequence counter"))?;
                u32::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        self.db
            .put_cf(self.cf(CF_COUNTERS)?, &key, next.to_be_bytes())?;
        Ok(next)
    }

    async fn list_items(&self, tx: &mut StoreTx, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let committed = self.scan_prefix(CF_ITEMS, order_id.as_bytes())?;
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
            None => match self.db.get_cf(self.cf(CF_ITEM_INDEX)?, item_id.as_bytes())? {
                Some(order_bytes) => {
                    let order_id = Uuid::from_slice(&order_bytes)
                        .map_err(|_| OrderError::internal("corrupt item index entry"))?;
                    self.get_json(CF_ITEMS, &compound_key(order_id, item_id))?
                }
                None => None,
            },
        };
        let Some(item) = item else {
            return Ok(None);
        };
        let in_outlet = self.read_order(tx, outlet_id, item.order_id)?.is_some();
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
        let committed = self.scan_prefix(CF_PAYMENTS, order_id.as_bytes())?;
        Ok(tx.staged.merge_payments(order_id, committed))
    }

    async fn insert_payment(&self, tx: &mut StoreTx, payment: &Payment) -> Result<()> {
        tx.staged.payments.push(payment.clone());
        Ok(())
    }
}
