use super::money::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sellable catalog product, as read from the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub outlet_id: Uuid,
    pub name: String,
    pub base_price: Money,
    /// Kitchen routing tag, copied onto order items.
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price_adjustment: Money,
}

/// A flat-charge add-on selectable for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: Money,
}

fn default_active() -> bool {
    true
}
