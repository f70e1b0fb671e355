//! Inputs and results of the `OrderEngine` operations.

use crate::domain::item::OrderItem;
use crate::domain::money::Money;
use crate::domain::order::{DeliveryDetails, Order, OrderType};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::pricing::{Discount, ModifierSelection};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line to be priced from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
    #[serde(default)]
    pub modifiers: Vec<ModifierSelection>,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewItem {
    pub fn new(product_id: Uuid, quantity: u32) -> Self {
        Self {
            product_id,
            variant_id: None,
            quantity,
            modifiers: Vec::new(),
            discount: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_type: OrderType,
    pub items: Vec<NewItem>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discount: Option<Discount>,
    /// Pre-computed tax. Defaults to zero.
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    /// Required for catering orders, rejected otherwise.
    #[serde(default)]
    pub catering_date: Option<NaiveDate>,
    #[serde(default)]
    pub deposit_amount: Option<Decimal>,
    /// Required for delivery orders, rejected otherwise.
    #[serde(default)]
    pub delivery: Option<DeliveryDetails>,
}

impl CreateOrder {
    pub fn new(order_type: OrderType, items: Vec<NewItem>) -> Self {
        Self {
            order_type,
            items,
            table_number: None,
            customer_id: None,
            notes: None,
            discount: None,
            tax_amount: None,
            catering_date: None,
            deposit_amount: None,
            delivery: None,
        }
    }
}

/// New quantity and notes for an existing line. `discount: None` keeps the
/// current discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub discount: Option<Discount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount: Decimal,
    /// Cash tendered. Absent means exact tender.
    #[serde(default)]
    pub amount_received: Option<Decimal>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

impl NewPayment {
    pub fn cash(amount: Decimal, amount_received: Decimal) -> Self {
        Self {
            method: PaymentMethod::Cash,
            amount,
            amount_received: Some(amount_received),
            reference_number: None,
        }
    }

    pub fn non_cash(method: PaymentMethod, amount: Decimal, reference: impl Into<String>) -> Self {
        Self {
            method,
            amount,
            amount_received: None,
            reference_number: Some(reference.into()),
        }
    }
}

/// An order with its lines and payments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub order: Order,
    pub total_paid: Money,
    pub remaining: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub order_id: Uuid,
    pub total_amount: Money,
    pub total_paid: Money,
    pub remaining: Money,
    pub payments: Vec<Payment>,
}
