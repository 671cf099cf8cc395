use std::{future::Future, sync::Arc, time::Duration};

use loyalty_common::MinorUnits;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualClientError {
    #[error("Could not initialize the accrual client: {0}")]
    Initialization(String),
    #[error("Could not reach the accrual system: {0}")]
    Transport(String),
    #[error("The accrual system is rate limiting us. Retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("The accrual system replied with unexpected status {0}")]
    UnexpectedStatus(u16),
    #[error("The accrual system sent an invalid response: {0}")]
    InvalidResponse(String),
}

/// The order status vocabulary of the accrual oracle. Values we don't know are kept, and are never considered final.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
    Unrecognised(String),
}

impl From<String> for AccrualStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "REGISTERED" => Self::Registered,
            "INVALID" => Self::Invalid,
            "PROCESSING" => Self::Processing,
            "PROCESSED" => Self::Processed,
            _ => Self::Unrecognised(value),
        }
    }
}

impl AccrualStatus {
    pub fn order_status(&self) -> Option<OrderStatusType> {
        match self {
            Self::Registered => Some(OrderStatusType::Registered),
            Self::Invalid => Some(OrderStatusType::Invalid),
            Self::Processing => Some(OrderStatusType::Processing),
            Self::Processed => Some(OrderStatusType::Processed),
            Self::Unrecognised(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

impl AccrualResponse {
    pub fn new(order: &str, status: AccrualStatus, accrual: Option<Decimal>) -> Self {
        Self { order: order.to_string(), status, accrual }
    }
}

/// What the reconciler should do with an order, according to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualVerdict {
    /// The oracle has no record of the order yet.
    NotRegistered,
    /// The oracle replied with a status we don't understand.
    Unrecognised(String),
    Outcome { status: OrderStatusType, accrual: MinorUnits },
}

impl AccrualVerdict {
    /// Interprets an oracle lookup. An accrual that cannot be represented in minor units, or is negative, makes the
    /// whole reply invalid.
    pub fn from_lookup(response: Option<AccrualResponse>) -> Result<Self, AccrualClientError> {
        let Some(response) = response else {
            return Ok(Self::NotRegistered);
        };
        let accrual = match response.accrual {
            Some(amount) => MinorUnits::from_decimal(amount)
                .map_err(|e| AccrualClientError::InvalidResponse(e.to_string()))?,
            None => MinorUnits::ZERO,
        };
        if accrual.is_negative() {
            return Err(AccrualClientError::InvalidResponse(format!("negative accrual {accrual}")));
        }
        match response.status {
            AccrualStatus::Unrecognised(s) => Ok(Self::Unrecognised(s)),
            status => {
                let status = status.order_status().unwrap_or(OrderStatusType::Registered);
                Ok(Self::Outcome { status, accrual })
            },
        }
    }
}

/// The accrual oracle decides how many points an order earns.
///
/// `lookup` returns `Ok(None)` when the oracle does not know the order (yet).
pub trait AccrualOracle: Send + Sync + 'static {
    fn lookup(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<AccrualResponse>, AccrualClientError>> + Send;
}

impl<T: AccrualOracle> AccrualOracle for Arc<T> {
    fn lookup(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<AccrualResponse>, AccrualClientError>> + Send {
        self.as_ref().lookup(order_id)
    }
}
