use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Qris,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Qris => "QRIS",
            Self::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payments are recorded synchronously, so `Completed` is the only state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Completed,
}

/// One settlement event against an order. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Money,
    pub status: PaymentStatus,
    pub reference_number: Option<String>,
    /// Cash tendered. CASH only.
    pub amount_received: Option<Money>,
    /// `amount_received - amount`. CASH only.
    pub change_amount: Option<Money>,
    pub processed_by: Uuid,
    pub processed_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Sum of completed payment amounts.
pub fn total_paid(payments: &[Payment]) -> Money {
    payments
        .iter()
        .filter(|p| p.is_completed())
        .map(|p| p.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_paid_sums_completed() {
        let order_id = Uuid::new_v4();
        let payment = |amount| Payment {
            id: Uuid::new_v4(),
            order_id,
            method: PaymentMethod::Transfer,
            amount: Money::new(amount),
            status: PaymentStatus::Completed,
            reference_number: Some("TRF-1".to_string()),
            amount_received: None,
            change_amount: None,
            processed_by: Uuid::new_v4(),
            processed_at: Utc::now(),
        };
        let payments = vec![payment(dec!(40000)), payment(dec!(40000.50))];
        assert_eq!(total_paid(&payments), Money::new(dec!(80000.50)));
        assert_eq!(total_paid(&[]), Money::ZERO);
    }

    #[test]
    fn test_payment_serializes_money_as_strings() {
        let p = Payment {
            id: Uuid::nil(),
            order_id: Uuid::nil(),
            method: PaymentMethod::Cash,
            amount: Money::new(dec!(50000)),
            status: PaymentStatus::Completed,
            reference_number: None,
            amount_received: Some(Money::new(dec!(100000))),
            change_amount: Some(Money::new(dec!(50000))),
            processed_by: Uuid::nil(),
            processed_at: Utc::now(),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["amount"], "50000.00");
        assert_eq!(json["change_amount"], "50000.00");
        assert_eq!(json["method"], "CASH");
        assert_eq!(json["status"], "COMPLETED");
    }
}
