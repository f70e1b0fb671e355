use super::money::Money;
use super::order::OrderStatus;
use super::pricing::{Discount, ItemQuote, LinePricing};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

/// Preparation status of a single line. `Ready` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Preparing,
    Ready,
}

static ITEM_TRANSITIONS: LazyLock<HashMap<ItemStatus, ItemStatus>> = LazyLock::new(|| {
    HashMap::from([
        (ItemStatus::Pending, ItemStatus::Preparing),
        (ItemStatus::Preparing, ItemStatus::Ready),
    ])
});

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
        }
    }

    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        ITEM_TRANSITIONS.get(self) == Some(&next)
    }

    /// Validates `self -> next` given the parent order's status.
    pub fn transition(&self, next: ItemStatus, order_status: OrderStatus) -> Result<ItemStatus> {
        if order_status.is_terminal() {
            return Err(OrderError::conflict(format!(
                "cannot update items of a {} order",
                order_status
            )));
        }
        if !self.can_transition_to(next) {
            return Err(OrderError::conflict(format!(
                "illegal item status transition from {} to {}",
                self, next
            )));
        }
        Ok(next)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemModifier {
    pub id: Uuid,
    pub order_item_id: Uuid,
    pub modifier_id: Uuid,
    pub quantity: u32,
    pub unit_price: Money,
}

/// One priced line of an order. Prices are snapshots taken when the line was
/// added and are never re-read from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
    pub unit_price: Money,
    pub modifiers: Vec<OrderItemModifier>,
    pub discount: Option<Discount>,
    pub discount_amount: Money,
    pub subtotal: Money,
    pub notes: Option<String>,
    pub status: ItemStatus,
    pub station: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    #[allow(clippy::too_many_arguments)]
    pub fn from_quote(
        order_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: u32,
        quote: ItemQuote,
        discount: Option<Discount>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        let modifiers = quote
            .modifiers
            .iter()
            .map(|m| OrderItemModifier {
                id: Uuid::new_v4(),
                order_item_id: id,
                modifier_id: m.modifier_id,
                quantity: m.quantity,
                unit_price: m.unit_price,
            })
            .collect();

        Self {
            id,
            order_id,
            product_id,
            variant_id,
            quantity,
            unit_price: quote.unit_price,
            modifiers,
            discount,
            discount_amount: quote.amounts.discount_amount,
            subtotal: quote.amounts.subtotal,
            notes,
            status: ItemStatus::Pending,
            station: quote.station,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn modifier_total(&self) -> Money {
        self.modifiers
            .iter()
            .map(|m| m.unit_price.times(m.quantity))
            .sum()
    }

    /// Re-derives discount and subtotal from the stored snapshot for a new
    /// quantity and discount.
    pub fn requote(&mut self, quantity: u32, discount: Option<Discount>, at: DateTime<Utc>) {
        let pricing = LinePricing {
            unit_price: self.unit_price,
            quantity,
            modifier_total: self.modifier_total(),
        };
        let amounts = pricing.quote(discount.as_ref());
        self.quantity = quantity;
        self.discount = discount;
        self.discount_amount = amounts.discount_amount;
        self.subtotal = amounts.subtotal;
        self.updated_at = at;
    }
}
