use super::commands::OrderDetails;
use crate::domain::item::{ItemStatus, OrderItem};
use crate::domain::order::{Order, OrderStatus};
use crate::domain::payment::{Payment, total_paid};
use crate::domain::ports::{CatalogStoreBox, OrderStore};
use crate::domain::pricing::order_totals;
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The order and payment core.
///
/// `OrderEngine` owns the storage port and the catalog. Every public
/// operation runs as one unit of work: it opens a transaction, checks all
/// preconditions, stages its writes, and commits, or rolls back on the first
/// failure.
///
/// Operations that read-then-write an order's totals or payments take the
/// order row lock first, so calls on the same order serialize while calls on
/// different orders never contend.
pub struct OrderEngine<S: OrderStore> {
    pub(super) store: S,
    pub(super) catalog: CatalogStoreBox,
}

impl<S: OrderStore> OrderEngine<S> {
    /// Creates a new `OrderEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional storage for orders, items and payments.
    /// * `catalog` - Read-only product, variant and modifier lookups.
    pub fn new(store: S, catalog: CatalogStoreBox) -> Self {
        Self { store, catalog }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commits on success, rolls back on failure.
    pub(super) async fn finish<T>(&self, tx: S::Tx, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.store.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let OrderError::Internal(source) = &err {
                    error!(error = %source, "unit of work failed");
                }
                if let Err(rollback_err) = self.store.rollback(tx).await {
                    warn!(error = ?rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    pub(super) async fn lock_order(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<Order> {
        self.store
            .get_order_for_update(tx, outlet_id, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    /// Recomputes the order totals from its full current item set and stages
    /// the updated order.
    pub(super) async fn recompute_totals(
        &self,
        tx: &mut S::Tx,
        order: &mut Order,
        at: DateTime<Utc>,
    ) -> Result<Vec<OrderItem>> {
        let items = self.store.list_items(tx, order.id).await?;
        let totals = order_totals(
            items.iter().map(|item| item.subtotal),
            order.discount.as_ref(),
            order.tax_amount,
        );
        debug!(
            order_id = %order.id,
            subtotal = %totals.subtotal,
            total = %totals.total_amount,
            "recomputed order totals"
        );
        order.apply_totals(totals, at);
        self.store.update_order(tx, order).await?;
        Ok(items)
    }

    /// Checks recomputed totals against the payments already recorded.
    ///
    /// A total below the amount paid is rejected. A total that now equals
    /// the amount paid settles a catering booking and completes the order,
    /// as the final payment would have.
    pub(super) async fn reconcile_paid(
        &self,
        tx: &mut S::Tx,
        order: &mut Order,
        at: DateTime<Utc>,
    ) -> Result<Vec<Payment>> {
        let payments = self.store.list_payments(tx, order.id).await?;
        let paid = total_paid(&payments);
        if paid > order.total_amount {
            return Err(OrderError::conflict(format!(
                "order total {} would fall below the {} already paid",
                order.total_amount, paid
            )));
        }
        if !paid.is_positive() || paid < order.total_amount {
            return Ok(payments);
        }

        let mut order_changed = false;
        if let Some(status) = order.catering.as_mut().and_then(|c| c.settle()) {
            info!(order_number = %order.order_number, %status, "catering status advanced");
            order_changed = true;
        }
        if order.complete_on_full_payment(at) {
            info!(order_number = %order.order_number, "order completed by full payment");
            order_changed = true;
        }
        if order_changed {
            order.updated_at = at;
            self.store.update_order(tx, order).await?;
        }
        Ok(payments)
    }

    /// Returns the order with its items and payments.
    pub async fn get_order(&self, outlet_id: Uuid, order_id: Uuid) -> Result<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let result = self.read_details(&mut tx, outlet_id, order_id).await;
        self.finish(tx, result).await
    }

    async fn read_details(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetails> {
        let order = self
            .store
            .get_order(tx, outlet_id, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        let items = self.store.list_items(tx, order_id).await?;
        let payments = self.store.list_payments(tx, order_id).await?;
        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    /// Applies a manual order status transition.
    ///
    /// The transition is validated against the status read at the start and
    /// written with a compare-and-swap on that status. If another writer
    /// changed the status in between, the call fails with a conflict and the
    /// caller should re-read and retry.
    pub async fn update_order_status(
        &self,
        outlet_id: Uuid,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let result = self
            .transition_order(&mut tx, outlet_id, order_id, next)
            .await;
        self.finish(tx, result).await
    }

    /// Cancels an order that has not reached a terminal status.
    pub async fn cancel_order(&self, outlet_id: Uuid, order_id: Uuid) -> Result<Order> {
        self.update_order_status(outlet_id, order_id, OrderStatus::Cancelled)
            .await
    }

    async fn transition_order(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order> {
        let order = self
            .store
            .get_order(tx, outlet_id, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        let current = order.status;
        current.transition(next)?;

        let now = Utc::now();
        let swapped = self
            .store
            .update_order_status(tx, outlet_id, order_id, current, next, now)
            .await?;
        if !swapped {
            return Err(OrderError::conflict(format!(
                "order {} status changed concurrently; re-fetch and retry",
                order.order_number
            )));
        }

        info!(
            order_number = %order.order_number,
            from = %current,
            to = %next,
            "order status updated"
        );
        self.store
            .get_order(tx, outlet_id, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    /// Advances one line's preparation status. Refused once the parent order
    /// is completed or cancelled.
    pub async fn update_item_status(
        &self,
        outlet_id: Uuid,
        item_id: Uuid,
        next: ItemStatus,
    ) -> Result<OrderItem> {
        let mut tx = self.store.begin().await?;
        let result = self
            .transition_item(&mut tx, outlet_id, item_id, next)
            .await;
        self.finish(tx, result).await
    }

    async fn transition_item(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        item_id: Uuid,
        next: ItemStatus,
    ) -> Result<OrderItem> {
        let item = self.find_item(tx, outlet_id, item_id).await?;
        let order = self.lock_order(tx, outlet_id, item.order_id).await?;
        // Re-read under the lock.
        let mut item = self.find_item(tx, outlet_id, item_id).await?;

        item.status = item.status.transition(next, order.status)?;
        item.updated_at = Utc::now();
        self.store.update_item(tx, &item).await?;

        debug!(%item_id, status = %item.status, "item status updated");
        Ok(item)
    }

    pub(super) async fn find_item(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderItem> {
        self.store
            .get_item(tx, outlet_id, item_id)
            .await?
            .ok_or_else(|| OrderError::not_found(format!("order item {item_id} not found")))
    }
}

pub(super) fn order_not_found(order_id: Uuid) -> OrderError {
    OrderError::not_found(format!("order {order_id} not found"))
}
