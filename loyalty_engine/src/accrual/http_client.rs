use std::time::Duration;

use log::*;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};

use crate::{
    accrual::oracle::{AccrualClientError, AccrualOracle, AccrualResponse},
    db_types::OrderId,
};

/// Used when the oracle rate limits us without saying for how long.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// HTTP client for the accrual system.
///
/// `GET {base}/api/orders/{number}` answers with
/// * `200` and a JSON body describing the order,
/// * `204` if the order is unknown to the accrual system,
/// * `429` and a `Retry-After` header (in seconds) when we are calling too often.
#[derive(Clone)]
pub struct AccrualClient {
    base_url: String,
    client: Client,
}

impl AccrualClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccrualClientError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| AccrualClientError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn url(&self, order_id: &OrderId) -> String {
        format!("{}/api/orders/{}", self.base_url, order_id.as_str())
    }
}

impl AccrualOracle for AccrualClient {
    async fn lookup(&self, order_id: &OrderId) -> Result<Option<AccrualResponse>, AccrualClientError> {
        let url = self.url(order_id);
        trace!("🔄️ Querying accrual system: {url}");
        let response = self.client.get(&url).send().await.map_err(|e| AccrualClientError::Transport(e.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<AccrualResponse>()
                    .await
                    .map_err(|e| AccrualClientError::InvalidResponse(e.to_string()))?;
                trace!("🔄️ Accrual system says order {order_id} is {:?}", body.status);
                Ok(Some(body))
            },
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                Err(AccrualClientError::RateLimited { retry_after })
            },
            status => Err(AccrualClientError::UnexpectedStatus(status.as_u16())),
        }
    }
}
