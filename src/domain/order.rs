use super::catering::{CateringDetails, CateringStatus};
use super::money::Money;
use super::pricing::{Discount, OrderTotals};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
    Catering,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DineIn => "DINE_IN",
            Self::Takeaway => "TAKEAWAY",
            Self::Delivery => "DELIVERY",
            Self::Catering => "CATERING",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fulfillment status of an order.
///
/// `New` is initial; `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

const FROM_NEW: &[OrderStatus] = &[OrderStatus::Preparing, OrderStatus::Cancelled];
const FROM_PREPARING: &[OrderStatus] = &[OrderStatus::Ready, OrderStatus::Cancelled];
const FROM_READY: &[OrderStatus] = &[OrderStatus::Completed, OrderStatus::Cancelled];
const TERMINAL: &[OrderStatus] = &[];

/// Adjacency map of legal manual transitions, built once.
static ORDER_TRANSITIONS: LazyLock<HashMap<OrderStatus, &'static [OrderStatus]>> =
    LazyLock::new(|| {
        HashMap::from([
            (OrderStatus::New, FROM_NEW),
            (OrderStatus::Preparing, FROM_PREPARING),
            (OrderStatus::Ready, FROM_READY),
            (OrderStatus::Completed, TERMINAL),
            (OrderStatus::Cancelled, TERMINAL),
        ])
    });

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        ORDER_TRANSITIONS
            .get(self)
            .is_some_and(|allowed| allowed.contains(&next))
    }

    /// Validates `self -> next` against the transition table.
    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::conflict(format!(
                "illegal order status transition from {} to {}",
                self, next
            )))
        }
    }

    /// Statuses from which a full payment completes the order.
    pub fn completes_on_full_payment(&self) -> bool {
        matches!(self, Self::New | Self::Preparing | Self::Ready)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub address: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One customer transaction. Totals are always derived from the items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub outlet_id: Uuid,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub table_number: Option<String>,
    pub customer_id: Option<Uuid>,
    pub notes: Option<String>,
    pub subtotal: Money,
    pub discount: Option<Discount>,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    /// Present only for `OrderType::Catering`.
    pub catering: Option<CateringDetails>,
    /// Present only for `OrderType::Delivery`.
    pub delivery: Option<DeliveryDetails>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn catering_status(&self) -> Option<CateringStatus> {
        self.catering.as_ref().map(|c| c.status)
    }

    /// Item mutations are only allowed while the order is `New`.
    pub fn ensure_editable(&self) -> Result<()> {
        if self.status == OrderStatus::New {
            Ok(())
        } else {
            Err(OrderError::conflict(format!(
                "order {} can no longer be modified (status {})",
                self.order_number, self.status
            )))
        }
    }

    pub fn apply_totals(&mut self, totals: OrderTotals, at: DateTime<Utc>) {
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.tax_amount = totals.tax_amount;
        self.total_amount = totals.total_amount;
        self.updated_at = at;
    }

    /// Moves the order to `Completed` after full payment.
    ///
    /// Returns `false` when the current status does not complete on payment.
    pub fn complete_on_full_payment(&mut self, at: DateTime<Utc>) -> bool {
        if !self.status.completes_on_full_payment() {
            return false;
        }
        self.status = OrderStatus::Completed;
        self.updated_at = at;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_lifecycle() {
        let mut status = OrderStatus::New;
        for next in [
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
        ] {
            status = status.transition(next).unwrap();
        }
        assert_eq!(status, OrderStatus::Completed);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_cancel_from_every_non_terminal_state() {
        for from in [OrderStatus::New, OrderStatus::Preparing, OrderStatus::Ready] {
            assert_eq!(
                from.transition(OrderStatus::Cancelled).unwrap(),
                OrderStatus::Cancelled
            );
        }
    }

    #[test]
    fn test_illegal_transitions_name_both_states() {
        let err = OrderStatus::Ready
            .transition(OrderStatus::Preparing)
            .unwrap_err();
        assert!(matches!(err, OrderError::Conflict(_)));
        assert_eq!(
            err.to_string(),
            "illegal order status transition from READY to PREPARING"
        );

        assert!(OrderStatus::New.transition(OrderStatus::Completed).is_err());
        assert!(OrderStatus::New.transition(OrderStatus::Ready).is_err());
        assert!(
            OrderStatus::Completed
                .transition(OrderStatus::Cancelled)
                .is_err()
        );
        assert!(OrderStatus::Cancelled.transition(OrderStatus::New).is_err());
        assert!(OrderStatus::New.transition(OrderStatus::New).is_err());
    }
}
