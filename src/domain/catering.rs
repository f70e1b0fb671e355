use super::money::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deposit/settlement sub-state of a catering order, driven by payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CateringStatus {
    Booked,
    DpPaid,
    Settled,
}

impl CateringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "BOOKED",
            Self::DpPaid => "DP_PAID",
            Self::Settled => "SETTLED",
        }
    }
}

impl fmt::Display for CateringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CateringDetails {
    pub date: NaiveDate,
    pub status: CateringStatus,
    /// Down payment. Recorded from the first payment unless agreed upfront.
    pub deposit_amount: Money,
}

impl CateringDetails {
    pub fn booked(date: NaiveDate, deposit_amount: Option<Money>) -> Self {
        Self {
            date,
            status: CateringStatus::Booked,
            deposit_amount: deposit_amount.unwrap_or_default(),
        }
    }

    /// Advances the sub-state for a payment of `amount`, given what was paid
    /// before it and the order total. Returns the new status if it changed.
    ///
    /// A first payment on a booked order marks the deposit as paid; a payment
    /// that covers the total settles the booking whatever the prior state.
    /// Both can apply to the same payment, in which case `Settled` wins.
    pub fn apply_payment(
        &mut self,
        paid_before: Money,
        amount: Money,
        total: Money,
    ) -> Option<CateringStatus> {
        let previous = self.status;

        if self.status == CateringStatus::Booked && paid_before.is_zero() {
            self.status = CateringStatus::DpPaid;
            if self.deposit_amount.is_zero() {
                self.deposit_amount = amount;
            }
        }
        if paid_before + amount >= total {
            self.status = CateringStatus::Settled;
        }

        (self.status != previous).then_some(self.status)
    }

    /// Settles the booking once an edit brings the total down to what was
    /// already paid.
    pub fn settle(&mut self) -> Option<CateringStatus> {
        if self.status == CateringStatus::Settled {
            return None;
        }
        self.status = CateringStatus::Settled;
        Some(self.status)
    }
}
