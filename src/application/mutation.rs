use super::commands::{CreateOrder, NewItem, OrderDetails, UpdateItem};
use super::engine::OrderEngine;
use crate::domain::catering::CateringDetails;
use crate::domain::item::OrderItem;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus, OrderType};
use crate::domain::ports::OrderStore;
use crate::domain::pricing::{ItemQuote, check_quantity, order_totals, quote_item};
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

impl<S: OrderStore> OrderEngine<S> {
    /// Creates a priced order in `New` status from at least one line.
    pub async fn create_order(
        &self,
        outlet_id: Uuid,
        request: CreateOrder,
        created_by: Uuid,
    ) -> Result<OrderDetails> {
        validate_create(&request)?;
        let mut tx = self.store.begin().await?;
        let result = self
            .create_order_in(&mut tx, outlet_id, request, created_by)
            .await;
        self.finish(tx, result).await
    }

    async fn create_order_in(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        request: CreateOrder,
        created_by: Uuid,
    ) -> Result<OrderDetails> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        // Price every line before anything is written.
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let quote = self.quote(outlet_id, line).await?;
            items.push(new_line(order_id, line, quote, now));
        }

        let tax_amount = match request.tax_amount {
            Some(tax) => Money::parse_input(tax, "tax amount")?,
            None => Money::ZERO,
        };
        let catering = match request.catering_date {
            Some(date) => {
                let deposit = request
                    .deposit_amount
                    .map(|d| Money::parse_input(d, "deposit amount"))
                    .transpose()?;
                Some(CateringDetails::booked(date, deposit))
            }
            None => None,
        };

        let day = now.date_naive();
        let sequence = self.store.next_order_sequence(tx, outlet_id, day).await?;
        let totals = order_totals(
            items.iter().map(|item| item.subtotal),
            request.discount.as_ref(),
            tax_amount,
        );

        let mut order = Order {
            id: order_id,
            outlet_id,
            order_number: format!("ORD-{}-{:04}", day.format("%Y%m%d"), sequence),
            order_type: request.order_type,
            status: OrderStatus::New,
            table_number: request.table_number,
            customer_id: request.customer_id,
            notes: request.notes,
            subtotal: Money::ZERO,
            discount: request.discount,
            discount_amount: Money::ZERO,
            tax_amount,
            total_amount: Money::ZERO,
            catering,
            delivery: request.delivery,
            created_by,
            created_at: now,
            updated_at: now,
        };
        order.apply_totals(totals, now);

        self.store.insert_order(tx, &order).await?;
        for item in &items {
            self.store.insert_item(tx, item).await?;
        }

        info!(
            order_number = %order.order_number,
            order_type = %order.order_type,
            items = items.len(),
            total = %order.total_amount,
            "order created"
        );
        Ok(OrderDetails {
            order,
            items,
            payments: Vec::new(),
        })
    }

    /// Adds a line to an order that is still `New`.
    pub async fn add_item(
        &self,
        outlet_id: Uuid,
        order_id: Uuid,
        line: NewItem,
    ) -> Result<OrderDetails> {
        validate_line(&line)?;
        let mut tx = self.store.begin().await?;
        let result = self.add_item_in(&mut tx, outlet_id, order_id, line).await;
        self.finish(tx, result).await
    }

    async fn add_item_in(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
        line: NewItem,
    ) -> Result<OrderDetails> {
        let mut order = self.lock_order(tx, outlet_id, order_id).await?;
        order.ensure_editable()?;

        let now = Utc::now();
        let quote = self.quote(outlet_id, &line).await?;
        let item = new_line(order.id, &line, quote, now);
        self.store.insert_item(tx, &item).await?;

        let items = self.recompute_totals(tx, &mut order, now).await?;
        let payments = self.reconcile_paid(tx, &mut order, now).await?;

        info!(
            order_number = %order.order_number,
            item_id = %item.id,
            total = %order.total_amount,
            "item added"
        );
        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    /// Changes quantity, notes and optionally the discount of a line.
    ///
    /// The subtotal is re-derived from the line's stored unit price and
    /// modifier snapshot; the catalog is not consulted. The new total may not
    /// drop below the amount already paid.
    pub async fn update_item(
        &self,
        outlet_id: Uuid,
        item_id: Uuid,
        update: UpdateItem,
    ) -> Result<OrderDetails> {
        check_quantity(update.quantity, "quantity")?;
        if let Some(discount) = &update.discount {
            discount.validate()?;
        }
        let mut tx = self.store.begin().await?;
        let result = self.update_item_in(&mut tx, outlet_id, item_id, update).await;
        self.finish(tx, result).await
    }

    async fn update_item_in(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        item_id: Uuid,
        update: UpdateItem,
    ) -> Result<OrderDetails> {
        let order_id = self.find_item(tx, outlet_id, item_id).await?.order_id;
        let mut order = self.lock_order(tx, outlet_id, order_id).await?;
        order.ensure_editable()?;
        let mut item = self.find_item(tx, outlet_id, item_id).await?;

        let now = Utc::now();
        let discount = update.discount.or(item.discount);
        item.requote(update.quantity, discount, now);
        item.notes = update.notes;
        self.store.update_item(tx, &item).await?;

        let items = self.recompute_totals(tx, &mut order, now).await?;
        let payments = self.reconcile_paid(tx, &mut order, now).await?;

        info!(
            order_number = %order.order_number,
            %item_id,
            quantity = item.quantity,
            total = %order.total_amount,
            "item updated"
        );
        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    /// Removes a line. An order always keeps at least one line, and its total
    /// may not drop below the amount already paid.
    pub async fn remove_item(&self, outlet_id: Uuid, item_id: Uuid) -> Result<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let result = self.remove_item_in(&mut tx, outlet_id, item_id).await;
        self.finish(tx, result).await
    }

    async fn remove_item_in(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderDetails> {
        let order_id = self.find_item(tx, outlet_id, item_id).await?.order_id;
        let mut order = self.lock_order(tx, outlet_id, order_id).await?;
        order.ensure_editable()?;
        let item = self.find_item(tx, outlet_id, item_id).await?;

        let remaining = self.store.list_items(tx, order.id).await?.len();
        if remaining <= 1 {
            return Err(OrderError::conflict("cannot remove the last item of an order"));
        }
        self.store.delete_item(tx, &item).await?;

        let now = Utc::now();
        let items = self.recompute_totals(tx, &mut order, now).await?;
        let payments = self.reconcile_paid(tx, &mut order, now).await?;

        info!(
            order_number = %order.order_number,
            %item_id,
            total = %order.total_amount,
            "item removed"
        );
        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    /// Resolves catalog records for a line and prices it.
    async fn quote(&self, outlet_id: Uuid, line: &NewItem) -> Result<ItemQuote> {
        let product = self.catalog.get_product(outlet_id, line.product_id).await?;
        let variant = match line.variant_id {
            Some(variant_id) => Some(
                self.catalog
                    .get_variant(outlet_id, product.id, variant_id)
                    .await?,
            ),
            None => None,
        };
        let mut modifiers = Vec::with_capacity(line.modifiers.len());
        for selection in &line.modifiers {
            let modifier = self
                .catalog
                .get_modifier(outlet_id, product.id, selection.modifier_id)
                .await?;
            modifiers.push((modifier, selection.quantity));
        }

        quote_item(
            &product,
            variant.as_ref(),
            &modifiers,
            line.quantity,
            line.discount.as_ref(),
        )
    }
}

fn new_line(order_id: Uuid, line: &NewItem, quote: ItemQuote, at: DateTime<Utc>) -> OrderItem {
    OrderItem::from_quote(
        order_id,
        line.product_id,
        line.variant_id,
        line.quantity,
        quote,
        line.discount,
        line.notes.clone(),
        at,
    )
}

fn validate_line(line: &NewItem) -> Result<()> {
    check_quantity(line.quantity, "quantity")?;
    for modifier in &line.modifiers {
        check_quantity(modifier.quantity, "modifier quantity")?;
    }
    if let Some(discount) = &line.discount {
        discount.validate()?;
    }
    Ok(())
}

fn validate_create(request: &CreateOrder) -> Result<()> {
    if request.items.is_empty() {
        return Err(OrderError::validation("an order needs at least one item"));
    }
    for line in &request.items {
        validate_line(line)?;
    }
    if let Some(discount) = &request.discount {
        discount.validate()?;
    }

    match request.order_type {
        OrderType::Catering => {
            if request.catering_date.is_none() {
                return Err(OrderError::validation(
                    "catering orders require a catering date",
                ));
            }
        }
        _ => {
            if request.catering_date.is_some() || request.deposit_amount.is_some() {
                return Err(OrderError::validation(
                    "catering fields are only allowed on catering orders",
                ));
            }
        }
    }

    match (request.order_type, &request.delivery) {
        (OrderType::Delivery, Some(delivery)) if delivery.address.trim().is_empty() => Err(
            OrderError::validation("delivery address must not be empty"),
        ),
        (OrderType::Delivery, None) => Err(OrderError::validation(
            "delivery orders require delivery details",
        )),
        (OrderType::Delivery, Some(_)) | (_, None) => Ok(()),
        (_, Some(_)) => Err(OrderError::validation(
            "delivery details are only allowed on delivery orders",
        )),
    }
}
