//! Row locks and staged writes shared by every `OrderStore` backend.
//!
//! A [`StoreTx`] owns the order-row locks it has taken and buffers its writes
//! in [`StagedWrites`]. Reads through the transaction see committed state
//! overlaid with the staged writes. Backends apply the staged writes
//! atomically on commit; dropping the transaction releases its locks and
//! discards the buffer.

use crate::domain::item::OrderItem;
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type RowMap = Arc<std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>;

/// Per-order exclusive locks, shared by all transactions of one store.
///
/// An entry lives only while some transaction holds or waits for it.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: RowMap,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, order_id: Uuid) -> RowGuard {
        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            rows.entry(order_id).or_default().clone()
        };
        RowGuard {
            order_id,
            guard: Some(row.lock_owned().await),
            rows: Arc::clone(&self.rows),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A held order row lock. Releasing the last reference to a row drops its
/// map entry.
pub struct RowGuard {
    order_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    rows: RowMap,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters clone the row under this map lock, so a count of one means
        // nobody else can reach it.
        if rows
            .get(&self.order_id)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            rows.remove(&self.order_id);
        }
    }
}

#[derive(Debug, Clone)]
pub enum ItemWrite {
    Put(OrderItem),
    Delete(OrderItem),
}

impl ItemWrite {
    pub fn item(&self) -> &OrderItem {
        match self {
            Self::Put(item) | Self::Delete(item) => item,
        }
    }
}

#[derive(Debug, Default)]
pub struct StagedWrites {
    pub orders: HashMap<Uuid, Order>,
    pub items: HashMap<Uuid, ItemWrite>,
    pub payments: Vec<Payment>,
}

impl StagedWrites {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.items.is_empty() && self.payments.is_empty()
    }

    /// Overlays staged item writes for `order_id` onto the committed items.
    pub fn merge_items(&self, order_id: Uuid, committed: Vec<OrderItem>) -> Vec<OrderItem> {
        let mut merged: HashMap<Uuid, OrderItem> =
            committed.into_iter().map(|item| (item.id, item)).collect();

        for (id, write) in &self.items {
            if write.item().order_id != order_id {
                continue;
            }
            match write {
                ItemWrite::Put(item) => {
                    merged.insert(*id, item.clone());
                }
                ItemWrite::Delete(_) => {
                    merged.remove(id);
                }
            }
        }

        let mut items: Vec<OrderItem> = merged.into_values().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }

    pub fn merge_payments(&self, order_id: Uuid, mut committed: Vec<Payment>) -> Vec<Payment> {
        committed.extend(
            self.payments
                .iter()
                .filter(|p| p.order_id == order_id)
                .cloned(),
        );
        committed.sort_by(|a, b| a.processed_at.cmp(&b.processed_at).then(a.id.cmp(&b.id)));
        committed
    }
}

/// A unit of work against one store.
pub struct StoreTx {
    locks: RowLocks,
    held: HashMap<Uuid, RowGuard>,
    pub staged: StagedWrites,
}

impl StoreTx {
    pub fn new(locks: RowLocks) -> Self {
        Self {
            locks,
            held: HashMap::new(),
            staged: StagedWrites::default(),
        }
    }

    pub fn holds_lock(&self, order_id: Uuid) -> bool {
        self.held.contains_key(&order_id)
    }

    /// Takes the exclusive lock on an order row. Re-entrant within one
    /// transaction.
    pub async fn lock_order(&mut self, order_id: Uuid) {
        if self.holds_lock(order_id) {
            return;
        }
        debug!(%order_id, "waiting for order row lock");
        let guard = self.locks.acquire(order_id).await;
        debug!(%order_id, "order row lock acquired");
        self.held.insert(order_id, guard);
    }

    /// Splits the transaction into its staged writes, keeping the locks alive
    /// until the returned guard set is dropped.
    pub fn into_parts(self) -> (StagedWrites, Vec<RowGuard>) {
        (self.staged, self.held.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_tx_dropped() {
        let locks = RowLocks::new();
        let order_id = Uuid::new_v4();

        let mut first = StoreTx::new(locks.clone());
        first.lock_order(order_id).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let mut second = StoreTx::new(locks);
                second.lock_order(order_id).await;
                second.holds_lock(order_id)
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(first);
        assert!(contender.await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_is_reentrant() {
        let mut tx = StoreTx::new(RowLocks::new());
        let order_id = Uuid::new_v4();
        tx.lock_order(order_id).await;
        tx.lock_order(order_id).await;
        assert!(tx.holds_lock(order_id));
    }

    #[tokio::test]
    async fn test_distinct_orders_do_not_contend() {
        let locks = RowLocks::new();
        let mut a = StoreTx::new(locks.clone());
        let mut b = StoreTx::new(locks);
        a.lock_order(Uuid::new_v4()).await;
        tokio::time::timeout(Duration::from_secs(1), b.lock_order(Uuid::new_v4()))
            .await
            .expect("unrelated orders must not block each other");
    }

    #[tokio::test]
    async fn test_released_rows_are_forgotten() {
        let locks = RowLocks::new();
        let order_id = Uuid::new_v4();

        let mut first = StoreTx::new(locks.clone());
        first.lock_order(order_id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let mut second = StoreTx::new(locks);
                second.lock_order(order_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(locks.tracked(), 1);

        drop(first);
        waiter.await.unwrap();
        assert_eq!(locks.tracked(), 0);

        for _ in 0..50 {
            let mut tx = StoreTx::new(locks.clone());
            tx.lock_order(Uuid::new_v4()).await;
            let (_staged, guards) = tx.into_parts();
            drop(guards);
        }
        assert_eq!(locks.tracked(), 0);
    }
}
