mod common;

use chrono::Utc;
use common::{Fixture, money};
use kasir_core::application::commands::{CreateOrder, NewItem, NewPayment, OrderDetails, UpdateItem};
use kasir_core::domain::catalog::Product;
use kasir_core::domain::money::Money;
use kasir_core::domain::order::{OrderStatus, OrderType};
use kasir_core::domain::pricing::{Discount, ModifierSelection};
use kasir_core::error::ErrorKind;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn assert_totals_consistent(details: &OrderDetails) {
    let order = &details.order;
    let items: Money = details.items.iter().map(|item| item.subtotal).sum();
    assert_eq!(order.subtotal, items);
    assert_eq!(
        order.total_amount,
        order.subtotal - order.discount_amount + order.tax_amount
    );
}

fn kopi_with_shot(fx: &Fixture, quantity: u32) -> NewItem {
    let mut line = NewItem::new(fx.kopi, quantity);
    line.modifiers = vec![ModifierSelection {
        modifier_id: fx.espresso_shot,
        quantity: 1,
    }];
    line
}

#[tokio::test]
async fn test_line_subtotal_includes_modifier_once() {
    let fx = Fixture::new().await;
    let details = fx
        .create(CreateOrder::new(OrderType::DineIn, vec![kopi_with_shot(&fx, 2)]))
        .await;

    let item = &details.items[0];
    assert_eq!(item.unit_price, money(dec!(25000)));
    assert_eq!(item.subtotal, money(dec!(55000)));
    assert_eq!(item.subtotal.to_string(), "55000.00");
    assert_eq!(item.modifiers.len(), 1);
    assert_eq!(item.modifiers[0].unit_price, money(dec!(5000)));
    assert_eq!(item.station.as_deref(), Some("BAR"));
    assert_eq!(details.order.total_amount, money(dec!(55000)));
}

#[tokio::test]
async fn test_create_order_numbers_and_totals() {
    let fx = Fixture::new().await;
    let mut large = NewItem::new(fx.kopi, 1);
    large.variant_id = Some(fx.kopi_large);
    let mut request = CreateOrder::new(OrderType::DineIn, vec![NewItem::new(fx.nasi, 2), large]);
    request.table_number = Some("12".to_string());
    request.discount = Some(Discount::percentage(dec!(10)));
    request.tax_amount = Some(dec!(11000));

    let first = fx.create(request).await;
    let second = fx.takeaway(1).await;

    // 100000 + 28000 = 128000, 10% off = 12800, plus 11000 tax.
    assert_eq!(first.order.subtotal, money(dec!(128000)));
    assert_eq!(first.order.discount_amount, money(dec!(12800)));
    assert_eq!(first.order.total_amount, money(dec!(126200)));
    assert_eq!(first.order.status, OrderStatus::New);
    assert_totals_consistent(&first);

    let day = Utc::now().format("%Y%m%d").to_string();
    assert_eq!(first.order.order_number, format!("ORD-{day}-0001"));
    assert_eq!(second.order.order_number, format!("ORD-{day}-0002"));
}

#[tokio::test]
async fn test_item_lifecycle_keeps_totals_consistent() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(1).await;
    let order_id = created.order.id;

    let added = fx
        .engine
        .add_item(fx.outlet, order_id, kopi_with_shot(&fx, 2))
        .await
        .unwrap();
    assert_eq!(added.items.len(), 2);
    assert_eq!(added.order.total_amount, money(dec!(105000)));
    assert_totals_consistent(&added);

    let kopi_line = added.items[1].id;
    let updated = fx
        .engine
        .update_item(
            fx.outlet,
            kopi_line,
            UpdateItem {
                quantity: 3,
                notes: Some("less sugar".to_string()),
                discount: Some(Discount::fixed(dec!(5000))),
            },
        )
        .await
        .unwrap();
    // 25000 × 3 + 5000 - 5000
    assert_eq!(updated.items[1].subtotal, money(dec!(75000)));
    assert_eq!(updated.items[1].notes.as_deref(), Some("less sugar"));
    assert_eq!(updated.order.total_amount, money(dec!(125000)));
    assert_totals_consistent(&updated);

    let removed = fx.engine.remove_item(fx.outlet, kopi_line).await.unwrap();
    assert_eq!(removed.items.len(), 1);
    assert_eq!(removed.order.total_amount, money(dec!(50000)));
    assert_totals_consistent(&removed);
}

#[tokio::test]
async fn test_update_keeps_existing_discount_when_omitted() {
    let fx = Fixture::new().await;
    let mut line = NewItem::new(fx.nasi, 1);
    line.discount = Some(Discount::percentage(dec!(20)));
    let created = fx
        .create(CreateOrder::new(OrderType::Takeaway, vec![line]))
        .await;

    let updated = fx
        .engine
        .update_item(
            fx.outlet,
            created.items[0].id,
            UpdateItem {
                quantity: 2,
                notes: None,
                discount: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.items[0].discount_amount, money(dec!(20000)));
    assert_eq!(updated.items[0].subtotal, money(dec!(80000)));
}

#[tokio::test]
async fn test_last_item_cannot_be_removed() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(1).await;

    let err = fx
        .engine
        .remove_item(fx.outlet, created.items[0].id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "cannot remove the last item of an order");

    let stored = fx.engine.get_order(fx.outlet, created.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 1);
}

#[tokio::test]
async fn test_mutations_refused_once_order_left_new() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(1).await;
    fx.engine
        .update_order_status(fx.outlet, created.order.id, OrderStatus::Preparing)
        .await
        .unwrap();

    let add = fx
        .engine
        .add_item(fx.outlet, created.order.id, NewItem::new(fx.kopi, 1))
        .await
        .unwrap_err();
    let update = fx
        .engine
        .update_item(
            fx.outlet,
            created.items[0].id,
            UpdateItem {
                quantity: 4,
                notes: None,
                discount: None,
            },
        )
        .await
        .unwrap_err();

    for err in [add, update] {
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("can no longer be modified"));
    }
}

#[tokio::test]
async fn test_existing_lines_keep_their_price_snapshot() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(1).await;

    fx.catalog
        .put_product(Product {
            id: fx.nasi,
            outlet_id: fx.outlet,
            name: "Nasi Goreng".to_string(),
            base_price: money(dec!(65000)),
            station: None,
            is_active: true,
        })
        .await;

    let updated = fx
        .engine
        .update_item(
            fx.outlet,
            created.items[0].id,
            UpdateItem {
                quantity: 2,
                notes: None,
                discount: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.items[0].unit_price, money(dec!(50000)));
    assert_eq!(updated.order.total_amount, money(dec!(100000)));

    // New lines pick up the new price.
    let added = fx
        .engine
        .add_item(fx.outlet, created.order.id, NewItem::new(fx.nasi, 1))
        .await
        .unwrap();
    assert_eq!(added.items[1].unit_price, money(dec!(65000)));
    assert_eq!(added.order.total_amount, money(dec!(165000)));
}

#[tokio::test]
async fn test_catalog_rejections() {
    let fx = Fixture::new().await;

    let inactive = fx
        .engine
        .create_order(
            fx.outlet,
            CreateOrder::new(OrderType::Takeaway, vec![NewItem::new(fx.retired, 1)]),
            fx.cashier,
        )
        .await
        .unwrap_err();
    assert_eq!(inactive.kind(), ErrorKind::Validation);

    let mut foreign_variant = NewItem::new(fx.nasi, 1);
    foreign_variant.variant_id = Some(fx.kopi_large);
    let err = fx
        .engine
        .create_order(
            fx.outlet,
            CreateOrder::new(OrderType::Takeaway, vec![foreign_variant]),
            fx.cashier,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let other_outlet = fx
        .engine
        .create_order(
            Uuid::new_v4(),
            CreateOrder::new(OrderType::Takeaway, vec![NewItem::new(fx.nasi, 1)]),
            fx.cashier,
        )
        .await
        .unwrap_err();
    assert_eq!(other_outlet.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_failed_mutation_leaves_order_untouched() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(1).await;

    let err = fx
        .engine
        .add_item(fx.outlet, created.order.id, NewItem::new(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let stored = fx.engine.get_order(fx.outlet, created.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 1);
    assert_eq!(stored.order.total_amount, created.order.total_amount);
}

#[tokio::test]
async fn test_total_cannot_drop_below_amount_paid() {
    let fx = Fixture::new().await;
    let mut request = CreateOrder::new(
        OrderType::Takeaway,
        vec![NewItem::new(fx.nasi, 1), NewItem::new(fx.kopi, 1)],
    );
    request.notes = Some("pay upfront".to_string());
    let created = fx.create(request).await;
    fx.engine
        .add_payment(
            fx.outlet,
            created.order.id,
            NewPayment::cash(dec!(70000), dec!(70000)),
            fx.cashier,
        )
        .await
        .unwrap();

    let nasi_line = created
        .items
        .iter()
        .find(|item| item.product_id == fx.nasi)
        .unwrap();
    let err = fx
        .engine
        .remove_item(fx.outlet, nasi_line.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        err.to_string(),
        "order total 25000.00 would fall below the 70000.00 already paid"
    );

    let err = fx
        .engine
        .update_item(
            fx.outlet,
            nasi_line.id,
            UpdateItem {
                quantity: 1,
                notes: None,
                discount: Some(Discount::percentage(dec!(50))),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = fx.engine.get_order(fx.outlet, created.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 2);
    assert_eq!(stored.order.total_amount, money(dec!(75000)));
    assert_eq!(stored.order.status, OrderStatus::New);
    assert_totals_consistent(&stored);
}

#[tokio::test]
async fn test_edit_down_to_amount_paid_completes_order() {
    let fx = Fixture::new().await;
    let created = fx.takeaway(2).await;
    fx.engine
        .add_payment(
            fx.outlet,
            created.order.id,
            NewPayment::cash(dec!(50000), dec!(50000)),
            fx.cashier,
        )
        .await
        .unwrap();

    let updated = fx
        .engine
        .update_item(
            fx.outlet,
            created.items[0].id,
            UpdateItem {
                quantity: 1,
                notes: None,
                discount: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.order.total_amount, money(dec!(50000)));
    assert_eq!(updated.order.status, OrderStatus::Completed);

    let summary = fx
        .engine
        .payment_summary(fx.outlet, created.order.id)
        .await
        .unwrap();
    assert!(summary.remaining.is_zero());
}
