#![allow(dead_code)]

use chrono::NaiveDate;
use kasir_core::application::commands::{CreateOrder, NewItem, OrderDetails};
use kasir_core::application::engine::OrderEngine;
use kasir_core::domain::catalog::{Modifier, Product, Variant};
use kasir_core::domain::money::Money;
use kasir_core::domain::order::OrderType;
use kasir_core::infrastructure::in_memory::{InMemoryCatalog, InMemoryOrderStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// An engine over in-memory storage with a small seeded catalog.
///
/// | product   | price  | extras                          |
/// |-----------|--------|---------------------------------|
/// | nasi      | 50000  | station KITCHEN                 |
/// | kopi      | 25000  | variant large +3000, shot 5000  |
/// | nasi box  | 50000  | catering box                    |
/// | retired   | 10000  | inactive                        |
pub struct Fixture {
    pub engine: OrderEngine<InMemoryOrderStore>,
    pub catalog: InMemoryCatalog,
    pub outlet: Uuid,
    pub cashier: Uuid,
    pub nasi: Uuid,
    pub kopi: Uuid,
    pub kopi_large: Uuid,
    pub espresso_shot: Uuid,
    pub nasi_box: Uuid,
    pub retired: Uuid,
}

fn product(outlet_id: Uuid, name: &str, price: Decimal, station: Option<&str>) -> Product {
    Product {
        id: Uuid::new_v4(),
        outlet_id,
        name: name.to_string(),
        base_price: Money::new(price),
        station: station.map(str::to_string),
        is_active: true,
    }
}

impl Fixture {
    pub async fn new() -> Self {
        let outlet = Uuid::new_v4();
        let catalog = InMemoryCatalog::new();

        let nasi = product(outlet, "Nasi Goreng", dec!(50000), Some("KITCHEN"));
        let kopi = product(outlet, "Kopi Susu", dec!(25000), Some("BAR"));
        let nasi_box = product(outlet, "Nasi Box", dec!(50000), Some("KITCHEN"));
        let mut retired = product(outlet, "Es Campur", dec!(10000), None);
        retired.is_active = false;

        let kopi_large = Variant {
            id: Uuid::new_v4(),
            product_id: kopi.id,
            name: "Large".to_string(),
            price_adjustment: Money::new(dec!(3000)),
        };
        let espresso_shot = Modifier {
            id: Uuid::new_v4(),
            product_id: kopi.id,
            name: "Extra shot".to_string(),
            price: Money::new(dec!(5000)),
        };

        let fixture = Self {
            engine: OrderEngine::new(InMemoryOrderStore::new(), Box::new(catalog.clone())),
            catalog: catalog.clone(),
            outlet,
            cashier: Uuid::new_v4(),
            nasi: nasi.id,
            kopi: kopi.id,
            kopi_large: kopi_large.id,
            espresso_shot: espresso_shot.id,
            nasi_box: nasi_box.id,
            retired: retired.id,
        };

        for p in [nasi, kopi, nasi_box, retired] {
            catalog.put_product(p).await;
        }
        catalog.put_variant(kopi_large).await;
        catalog.put_modifier(espresso_shot).await;
        fixture
    }

    pub async fn create(&self, request: CreateOrder) -> OrderDetails {
        self.engine
            .create_order(self.outlet, request, self.cashier)
            .await
            .unwrap()
    }

    /// A takeaway order of `quantity` × nasi goreng (50000 each).
    pub async fn takeaway(&self, quantity: u32) -> OrderDetails {
        self.create(CreateOrder::new(
            OrderType::Takeaway,
            vec![NewItem::new(self.nasi, quantity)],
        ))
        .await
    }

    /// A catering order of `boxes` × nasi box (50000 each).
    pub async fn catering(&self, boxes: u32) -> OrderDetails {
        let mut request = CreateOrder::new(OrderType::Catering, vec![NewItem::new(self.nasi_box, boxes)]);
        request.catering_date = NaiveDate::from_ymd_opt(2026, 12, 20);
        self.create(request).await
    }
}

pub fn money(value: Decimal) -> Money {
    Money::new(value)
}
