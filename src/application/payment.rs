use super::commands::{NewPayment, PaymentOutcome, PaymentSummary};
use super::engine::{OrderEngine, order_not_found};
use crate::domain::money::Money;
use crate::domain::order::OrderStatus;
use crate::domain::payment::{Payment, PaymentMethod, PaymentStatus, total_paid};
use crate::domain::ports::OrderStore;
use crate::error::{OrderError, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// A payment request that passed input validation.
struct ValidatedPayment {
    method: PaymentMethod,
    amount: Money,
    amount_received: Option<Money>,
    change_amount: Option<Money>,
    reference_number: Option<String>,
}

fn validate_payment(request: NewPayment) -> Result<ValidatedPayment> {
    let amount = Money::parse_input(request.amount, "payment amount")?;
    if !amount.is_positive() {
        return Err(OrderError::validation(
            "payment amount must be greater than zero",
        ));
    }

    let (amount_received, change_amount) = match request.method {
        PaymentMethod::Cash => {
            let received = match request.amount_received {
                Some(received) => Money::parse_input(received, "amount received")?,
                None => amount,
            };
            if received < amount {
                return Err(OrderError::validation(
                    "amount received must cover the payment amount",
                ));
            }
            (Some(received), Some(received - amount))
        }
        PaymentMethod::Qris | PaymentMethod::Transfer => (None, None),
    };

    Ok(ValidatedPayment {
        method: request.method,
        amount,
        amount_received,
        change_amount,
        reference_number: request.reference_number,
    })
}

impl<S: OrderStore> OrderEngine<S> {
    /// Records a payment against an order.
    ///
    /// Runs under the order row lock: the amount already paid is read after
    /// the lock is taken, so concurrent payments on one order are checked
    /// against each other's committed results and can never jointly overpay.
    /// A payment that brings the total paid up to the order total settles a
    /// catering booking and completes the order. Not idempotent: a retried
    /// call records a second payment.
    pub async fn add_payment(
        &self,
        outlet_id: Uuid,
        order_id: Uuid,
        request: NewPayment,
        processed_by: Uuid,
    ) -> Result<PaymentOutcome> {
        let payment = validate_payment(request)?;
        let mut tx = self.store.begin().await?;
        let result = self
            .add_payment_in(&mut tx, outlet_id, order_id, payment, processed_by)
            .await;
        self.finish(tx, result).await
    }

    async fn add_payment_in(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
        request: ValidatedPayment,
        processed_by: Uuid,
    ) -> Result<PaymentOutcome> {
        let mut order = self.lock_order(tx, outlet_id, order_id).await?;
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::conflict("cannot add payment to a cancelled order"));
        }

        let paid_before = total_paid(&self.store.list_payments(tx, order.id).await?);
        if paid_before >= order.total_amount {
            return Err(OrderError::conflict("order is already fully paid"));
        }
        let paid_after = paid_before + request.amount;
        if paid_after > order.total_amount {
            return Err(OrderError::conflict("payment exceeds remaining balance"));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            method: request.method,
            amount: request.amount,
            status: PaymentStatus::Completed,
            reference_number: request.reference_number,
            amount_received: request.amount_received,
            change_amount: request.change_amount,
            processed_by,
            processed_at: now,
        };
        self.store.insert_payment(tx, &payment).await?;

        let mut order_changed = false;
        let total = order.total_amount;
        if let Some(catering) = order.catering.as_mut()
            && let Some(status) = catering.apply_payment(paid_before, payment.amount, total)
        {
            info!(order_number = %order.order_number, %status, "catering status advanced");
            order_changed = true;
        }

        let fully_paid = paid_after >= order.total_amount;
        if fully_paid && order.complete_on_full_payment(now) {
            info!(order_number = %order.order_number, "order completed by full payment");
            order_changed = true;
        }

        if order_changed {
            order.updated_at = now;
            self.store.update_order(tx, &order).await?;
        }

        info!(
            order_number = %order.order_number,
            method = %payment.method,
            amount = %payment.amount,
            paid = %paid_after,
            total = %order.total_amount,
            "payment recorded"
        );
        let remaining = order.total_amount.saturating_sub(paid_after);
        Ok(PaymentOutcome {
            payment,
            order,
            total_paid: paid_after,
            remaining,
        })
    }

    /// Total paid, remaining balance and payment history for an order.
    pub async fn payment_summary(&self, outlet_id: Uuid, order_id: Uuid) -> Result<PaymentSummary> {
        let mut tx = self.store.begin().await?;
        let result = self.summarize_payments(&mut tx, outlet_id, order_id).await;
        self.finish(tx, result).await
    }

    async fn summarize_payments(
        &self,
        tx: &mut S::Tx,
        outlet_id: Uuid,
        order_id: Uuid,
    ) -> Result<PaymentSummary> {
        let order = self
            .store
            .get_order(tx, outlet_id, order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        let payments = self.store.list_payments(tx, order_id).await?;
        let paid = total_paid(&payments);
        Ok(PaymentSummary {
            order_id,
            total_amount: order.total_amount,
            total_paid: paid,
            remaining: order.total_amount.saturating_sub(paid),
            payments,
        })
    }
}
