use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use loyalty_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::luhn::is_valid_luhn;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been accepted by the ledger, but the accrual oracle has not reported on it yet.
    New,
    /// The accrual oracle knows about the order, but has not started calculating the reward.
    Registered,
    /// The oracle refused to award points for this order. Final.
    Invalid,
    /// The oracle is busy calculating the reward.
    Processing,
    /// The reward has been calculated and credited to the owner's balance. Final.
    Processed,
}

impl OrderStatusType {
    /// Terminal statuses are never left once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// Statuses that can be recorded without touching a balance. `NEW` is only set when an order is stored, and
    /// `PROCESSED` is only reached by settling the order, which credits the owner.
    pub fn is_uncredited_update(&self) -> bool {
        matches!(self, Self::Registered | Self::Processing | Self::Invalid)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "NEW"),
            OrderStatusType::Registered => write!(f, "REGISTERED"),
            OrderStatusType::Invalid => write!(f, "INVALID"),
            OrderStatusType::Processing => write!(f, "PROCESSING"),
            OrderStatusType::Processed => write!(f, "PROCESSED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "REGISTERED" => Ok(Self::Registered),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize)]
#[sqlx(transparent)]
pub struct OrderId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid order number")]
pub struct InvalidOrderNumber(pub String);

impl FromStr for OrderId {
    type Err = InvalidOrderNumber;

    /// Order numbers are strings of decimal digits that pass the Luhn checksum. Surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if is_valid_luhn(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidOrderNumber(s.to_string()))
        }
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: i64,
    /// Points awarded for the order. Zero until the order reaches `PROCESSED`.
    pub accrual: MinorUnits,
    pub status: OrderStatusType,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    /// The user submitting the order. They become its owner.
    pub user_id: i64,
}

impl NewOrder {
    pub fn new(order_id: OrderId, user_id: i64) -> Self {
        Self { order_id, user_id }
    }
}

//--------------------------------------     AccrualUpdate     ---------------------------------------------------------
/// A status change reported by the accrual oracle, ready to be recorded against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualUpdate {
    pub status: OrderStatusType,
    pub accrual: MinorUnits,
}

impl AccrualUpdate {
    pub fn new(status: OrderStatusType, accrual: MinorUnits) -> Self {
        Self { status, accrual }
    }
}

//--------------------------------------        Balance        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Balance {
    pub user_id: i64,
    pub current: MinorUnits,
    pub withdrawn: MinorUnits,
}

impl Balance {
    /// The balance of a user that has never been credited or debited.
    pub fn empty(user_id: i64) -> Self {
        Self { user_id, current: MinorUnits::ZERO, withdrawn: MinorUnits::ZERO }
    }
}

//--------------------------------------       Withdrawal      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    /// The order number the points were spent against.
    pub order_id: OrderId,
    pub amount: MinorUnits,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: i64,
    pub order_id: OrderId,
    pub amount: MinorUnits,
}

impl NewWithdrawal {
    pub fn new(user_id: i64, order_id: OrderId, amount: MinorUnits) -> Self {
        Self { user_id, order_id, amount }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_ids_must_pass_luhn() {
        assert_eq!("79927398713".parse::<OrderId>().unwrap().as_str(), "79927398713");
        assert_eq!(" 12345678903\n".parse::<OrderId>().unwrap().as_str(), "12345678903");
        assert!("79927398710".parse::<OrderId>().is_err());
        assert!("".parse::<OrderId>().is_err());
        assert!("1234-5678".parse::<OrderId>().is_err());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            OrderStatusType::New,
            OrderStatusType::Registered,
            OrderStatusType::Invalid,
            OrderStatusType::Processing,
            OrderStatusType::Processed,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("processed".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn terminal_statuses_and_plain_updates() {
        use OrderStatusType::*;
        assert!(Invalid.is_terminal());
        assert!(Processed.is_terminal());
        assert!(!Processing.is_terminal());
        assert!(Registered.is_uncredited_update());
        assert!(Processing.is_uncredited_update());
        assert!(Invalid.is_uncredited_update());
        assert!(!New.is_uncredited_update());
        assert!(!Processed.is_uncredited_update());
    }
}
