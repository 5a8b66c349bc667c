use crate::models::Position;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("positions request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("positions API returned {0}")]
    Status(StatusCode),
    #[error("positions API returned an unreadable body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client for the Data API positions index.
#[derive(Clone)]
pub struct PositionsClient {
    client: Client,
    url: Url,
}

impl PositionsClient {
    pub fn new(url: Url) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url })
    }

    /// Positions the wallet can claim right now: `redeemable` and `size > 0`,
    /// in the order the API returned them. Rows that do not decode are
    /// skipped with a warning; the rest of the page is still used.
    pub async fn get_redeemable_positions(&self, wallet: &str) -> Result<Vec<Position>, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("user", wallet)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let rows: Vec<serde_json::Value> = response.json().await.map_err(FetchError::Decode)?;
        let total = rows.len();
        let redeemable: Vec<Position> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value::<Position>(row) {
                Ok(position) => Some(position),
                Err(e) => {
                    warn!("position_skipped wallet={} index={} error={}", wallet, index, e);
                    None
                }
            })
            .filter(Position::is_claimable)
            .collect();
        debug!(
            "positions_fetched wallet={} total={} redeemable={}",
            wallet,
            total,
            redeemable.len()
        );
        Ok(redeemable)
    }
}
