use crate::domain::catering::CateringStatus;
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderStatus, OrderType};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    order_number: &'a str,
    order_type: OrderType,
    status: OrderStatus,
    catering_status: Option<CateringStatus>,
    subtotal: Money,
    discount: Money,
    tax: Money,
    total: Money,
    paid: Money,
    remaining: Money,
}

/// Writes one summary row per order as CSV.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every order with the amount paid against it, then flushes.
    pub fn write_orders<'a, I>(&mut self, orders: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a Order, Money)>,
    {
        for (order, paid) in orders {
            self.writer.serialize(OrderRow {
                order_number: &order.order_number,
                order_type: order.order_type,
                status: order.status,
                catering_status: order.catering_status(),
                subtotal: order.subtotal,
                discount: order.discount_amount,
                tax: order.tax_amount,
                total: order.total_amount,
                paid,
                remaining: order.total_amount.saturating_sub(paid),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catering::CateringDetails;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(number: &str, order_type: OrderType, total: Money) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            outlet_id: Uuid::new_v4(),
            order_number: number.to_string(),
            order_type,
            status: OrderStatus::New,
            table_number: None,
            customer_id: None,
            notes: None,
            subtotal: total,
            discount: None,
            discount_amount: Money::ZERO,
            tax_amount: Money::ZERO,
            total_amount: total,
            catering: None,
            delivery: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_write_orders() {
        let takeaway = order("ORD-20261019-0001", OrderType::Takeaway, Money::new(dec!(55000)));
        let mut catering = order("ORD-20261019-0002", OrderType::Catering, Money::new(dec!(1000000)));
        catering.catering = Some(CateringDetails::booked(
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            None,
        ));

        let mut buffer = Vec::new();
        OrderWriter::new(&mut buffer)
            .write_orders([
                (&takeaway, Money::new(dec!(20000))),
                (&catering, Money::ZERO),
            ])
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines[0],
            "order_number,order_type,status,catering_status,subtotal,discount,tax,total,paid,remaining"
        );
        assert_eq!(
            lines[1],
            "ORD-20261019-0001,TAKEAWAY,NEW,,55000.00,0.00,0.00,55000.00,20000.00,35000.00"
        );
        assert_eq!(
            lines[2],
            "ORD-20261019-0002,CATERING,NEW,BOOKED,1000000.00,0.00,0.00,1000000.00,0.00,1000000.00"
        );
    }
}
