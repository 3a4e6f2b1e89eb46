use crate::{
    config::ClientConfig,
    error::FetchError,
    types::{
        MarketId,
        MarketInfo,
        MarketSnapshot,
        PoolState,
        TransactionId,
    },
};
use reqwest::StatusCode;
use std::fmt;
use tracing::{
    debug,
    warn,
};

/// Read-only view of the program's public state. Every call is a single request;
/// nothing is cached or retried.
#[derive(Clone)]
pub struct ChainStateClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ChainStateClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::with_http(config, http))
    }

    pub fn with_http(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw struct literal stored under `key`, `None` when the key is absent.
    pub async fn mapping_value(
        &self,
        mapping: &str,
        key: &str,
    ) -> Result<Option<String>, FetchError> {
        let url = format!("{}/mapping/{mapping}/{key}", self.config.program_url());
        debug!(%url, "reading mapping");
        let Some(body) = self.get_text(&url).await? else {
            return Ok(None);
        };
        Ok(mapping_body(&body))
    }

    pub async fn market(&self, market_id: &MarketId) -> Option<MarketInfo> {
        let raw = self
            .read_for_display(&self.config.mappings.markets, market_id)
            .await?;
        match MarketInfo::decode(&raw, self.config.market_schema) {
            Ok(info) => Some(info),
            Err(error) => {
                warn!(%market_id, %error, "discarding malformed market record");
                None
            }
        }
    }

    pub async fn pool(&self, market_id: &MarketId) -> Option<PoolState> {
        let raw = self
            .read_for_display(&self.config.mappings.pools, market_id)
            .await?;
        match PoolState::decode(&raw) {
            Ok(pool) => {
                if !pool.is_consistent() {
                    warn!(
                        %market_id,
                        total_yes = pool.total_yes,
                        total_no = pool.total_no,
                        total_pool = pool.total_pool,
                        "pool totals do not add up"
                    );
                }
                Some(pool)
            }
            Err(error) => {
                warn!(%market_id, %error, "discarding malformed pool record");
                None
            }
        }
    }

    /// Market and pool read concurrently; a market without a pool entry yet
    /// reports an empty pool.
    pub async fn market_snapshot(&self, market_id: &MarketId) -> Option<MarketSnapshot> {
        let (info, pool) = futures::join!(self.market(market_id), self.pool(market_id));
        Some(MarketSnapshot {
            market_id: market_id.clone(),
            info: info?,
            pool: pool.unwrap_or_default(),
        })
    }

    /// Health signal only.
    pub async fn program_live(&self) -> bool {
        let url = self.config.program_url();
        match self.http.get(&url).send().await {
            Ok(res) => {
                debug!(%url, status = %res.status(), "program check");
                res.status().is_success()
            }
            Err(error) => {
                warn!(%url, %error, "program check failed");
                false
            }
        }
    }

    pub async fn latest_height(&self) -> Result<u32, FetchError> {
        let url = format!("{}/block/height/latest", self.config.network_url());
        let body = self
            .get_text(&url)
            .await?
            .ok_or(FetchError::Unexpected(StatusCode::NOT_FOUND))?;
        serde_json::from_str(body.trim())
            .map_err(|e| FetchError::InvalidBody(format!("block height: {e}")))
    }

    pub async fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<serde_json::Value>, FetchError> {
        let url = format!("{}/transaction/{id}", self.config.network_url());
        let Some(body) = self.get_text(&url).await? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::InvalidBody(format!("transaction: {e}")))?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Latest transactions touching the program, newest first as the node orders
    /// them. A program the node does not know has none.
    pub async fn recent_transactions(
        &self,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, FetchError> {
        let url = format!("{}/transactions?limit={limit}", self.config.program_url());
        let Some(body) = self.get_text(&url).await? else {
            return Ok(Vec::new());
        };
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| FetchError::InvalidBody(format!("transactions: {e}")))?;
        match value {
            serde_json::Value::Null => Ok(Vec::new()),
            serde_json::Value::Array(transactions) => Ok(transactions),
            other => Err(FetchError::InvalidBody(format!(
                "transactions: expected an array, got {other}"
            ))),
        }
    }

    async fn get_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(FetchError::Unreachable)?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Unexpected(status));
        }
        res.text().await.map(Some).map_err(FetchError::Unreachable)
    }

    async fn read_for_display(
        &self,
        mapping: &str,
        market_id: &MarketId,
    ) -> Option<String> {
        match self.mapping_value(mapping, &market_id.to_input()).await {
            Ok(value) => value,
            Err(error) => {
                warn!(mapping, %market_id, %error, "mapping unavailable");
                None
            }
        }
    }
}

/// The node answers an unset key with `null` and may quote the literal as a
/// JSON string.
fn mapping_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    if trimmed.starts_with('"') {
        return serde_json::from_str::<String>(trimmed)
            .ok()
            .or_else(|| Some(trimmed.to_owned()));
    }
    Some(trimmed.to_owned())
}

impl fmt::Display for ChainStateClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config.program_url())
    }
}
