//! Price snapshots for order lines and order-level aggregation.
//!
//! Catalog prices are read only by [`quote_item`], when a line is first added.
//! Later changes go through [`LinePricing::quote`] with the stored snapshot.

use super::catalog::{Modifier, Product, Variant};
use super::money::{MAX_AMOUNT, Money};
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest quantity accepted for a line or a modifier selection.
pub const MAX_QUANTITY: u32 = 9999;

/// Rejects zero and quantities above [`MAX_QUANTITY`].
pub fn check_quantity(quantity: u32, field: &str) -> Result<()> {
    if quantity == 0 {
        return Err(OrderError::validation(format!(
            "{field} must be greater than zero"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(OrderError::validation(format!(
            "{field} exceeds maximum allowed ({MAX_QUANTITY})"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    #[serde(rename = "type")]
    pub kind: DiscountType,
    pub value: Decimal,
}

impl Discount {
    pub fn percentage(value: Decimal) -> Self {
        Self {
            kind: DiscountType::Percentage,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self {
            kind: DiscountType::FixedAmount,
            value,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.kind {
            DiscountType::Percentage => {
                if self.value < Decimal::ZERO || self.value > Decimal::ONE_HUNDRED {
                    return Err(OrderError::validation(
                        "percentage discount must be between 0 and 100",
                    ));
                }
            }
            DiscountType::FixedAmount => {
                Money::parse_input(self.value, "discount value")?;
            }
        }
        Ok(())
    }

    /// Discount taken off `base`, never more than `base` itself.
    pub fn amount_for(&self, base: Money) -> Money {
        let raw = match self.kind {
            DiscountType::Percentage => base.percent(self.value),
            DiscountType::FixedAmount => Money::new(self.value),
        };
        raw.round().min(base)
    }
}

/// Discount amount for an optional discount.
pub fn discount_amount(discount: Option<&Discount>, base: Money) -> Money {
    discount.map_or(Money::ZERO, |d| d.amount_for(base))
}

/// A requested modifier selection, before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSelection {
    pub modifier_id: Uuid,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// A modifier charge frozen at quote time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedModifier {
    pub modifier_id: Uuid,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Snapshot inputs for one line. Modifier charges apply once per line and are
/// not multiplied by the line quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    pub unit_price: Money,
    pub quantity: u32,
    pub modifier_total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub line_before_discount: Money,
    pub discount_amount: Money,
    pub subtotal: Money,
}

impl LinePricing {
    pub fn quote(&self, discount: Option<&Discount>) -> LineAmounts {
        let line_before_discount = self.unit_price.times(self.quantity) + self.modifier_total;
        let discount_amount = discount_amount(discount, line_before_discount);
        LineAmounts {
            line_before_discount,
            discount_amount,
            subtotal: line_before_discount - discount_amount,
        }
    }
}

/// Full price snapshot for a new line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuote {
    pub unit_price: Money,
    pub modifiers: Vec<PricedModifier>,
    pub amounts: LineAmounts,
    pub station: Option<String>,
}

/// Prices a new line from catalog records.
///
/// `modifiers` pairs each resolved catalog modifier with its selected quantity.
pub fn quote_item(
    product: &Product,
    variant: Option<&Variant>,
    modifiers: &[(Modifier, u32)],
    quantity: u32,
    discount: Option<&Discount>,
) -> Result<ItemQuote> {
    check_quantity(quantity, "quantity")?;
    if !product.is_active {
        return Err(OrderError::validation(format!(
            "product {} is not available",
            product.name
        )));
    }
    if let Some(discount) = discount {
        discount.validate()?;
    }

    let mut unit_price = Money::parse_input(product.base_price.value(), "product price")?;
    if let Some(variant) = variant {
        if variant.product_id != product.id {
            return Err(OrderError::not_found(format!(
                "variant {} not found for product {}",
                variant.id, product.id
            )));
        }
        Money::check_bounds(variant.price_adjustment.value(), "variant price adjustment")?;
        unit_price += variant.price_adjustment;
    }
    if unit_price.value().is_sign_negative() && !unit_price.is_zero() {
        return Err(OrderError::validation(format!(
            "unit price of {} must not be negative",
            product.name
        )));
    }
    if unit_price.value() > MAX_AMOUNT {
        return Err(OrderError::validation(format!(
            "unit price of {} exceeds maximum allowed ({MAX_AMOUNT})",
            product.name
        )));
    }

    let mut priced = Vec::with_capacity(modifiers.len());
    for (modifier, qty) in modifiers {
        if modifier.product_id != product.id {
            return Err(OrderError::not_found(format!(
                "modifier {} not found for product {}",
                modifier.id, product.id
            )));
        }
        check_quantity(*qty, "modifier quantity")?;
        priced.push(PricedModifier {
            modifier_id: modifier.id,
            quantity: *qty,
            unit_price: Money::parse_input(modifier.price.value(), "modifier price")?,
        });
    }

    let pricing = LinePricing {
        unit_price,
        quantity,
        modifier_total: modifier_total(&priced),
    };

    Ok(ItemQuote {
        unit_price,
        modifiers: priced,
        amounts: pricing.quote(discount),
        station: product.station.clone(),
    })
}

pub fn modifier_total(modifiers: &[PricedModifier]) -> Money {
    modifiers
        .iter()
        .map(|m| m.unit_price.times(m.quantity))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

/// Aggregates item subtotals into order totals. Always computed from the full
/// item set so repeated recomputation cannot drift.
pub fn order_totals<I>(item_subtotals: I, discount: Option<&Discount>, tax: Money) -> OrderTotals
where
    I: IntoIterator<Item = Money>,
{
    let subtotal: Money = item_subtotals.into_iter().sum();
    let discount_amount = discount_amount(discount, subtotal);
    OrderTotals {
        subtotal,
        discount_amount,
        tax_amount: tax,
        total_amount: subtotal - discount_amount + tax,
    }
}
