//! Bitget v2 public REST client for USDT-margined perpetuals.

use crate::config::ExchangeConfig;
use crate::exchange::traits::{Granularity, MarketDataSource, OrderBook, Ticker};
use crate::exchange::types::*;
use crate::indicators::Bar;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Read-only Bitget market data client.
#[derive(Debug, Clone)]
pub struct BitgetClient {
    http: Client,
    base_url: String,
    product_type: String,
}

impl BitgetClient {
    /// Create a new client from configuration.
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            product_type: config.product_type.clone(),
        })
    }

    /// GET a mix-market endpoint and unwrap the response envelope.
    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let mut url = format!(
            "{}/api/v2/mix/market/{}?productType={}",
            self.base_url, endpoint, self.product_type
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, value));
        }

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", endpoint, status);
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", endpoint))?;

        if envelope.code != SUCCESS_CODE {
            anyhow::bail!("{} returned code {}: {}", endpoint, envelope.code, envelope.msg);
        }

        envelope
            .data
            .with_context(|| format!("{} response has no data", endpoint))
    }

    // ==================== Market Data (Public) ====================

    /// Get the 24h ticker for one contract.
    #[instrument(skip(self))]
    pub async fn get_ticker(&self, symbol: &str) -> Result<Option<Ticker>> {
        let raw: Vec<RawTicker> = self
            .get_data("ticker", &[("symbol", symbol.to_string())])
            .await?;
        Ok(raw.into_iter().next().and_then(RawTicker::into_ticker))
    }

    /// Get tickers for all contracts of the configured product type.
    #[instrument(skip(self))]
    pub async fn get_tickers(&self) -> Result<Vec<Ticker>> {
        let raw: Vec<RawTicker> = self.get_data("tickers", &[]).await?;
        Ok(raw.into_iter().filter_map(RawTicker::into_ticker).collect())
    }

    /// Get candles, oldest first.
    #[instrument(skip(self))]
    pub async fn get_candles(
        &self,
        symbol: &str,
        granularity: Granularity,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .get_data(
                "candles",
                &[
                    ("symbol", symbol.to_string()),
                    ("granularity", granularity.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(parse_candles(&rows))
    }

    /// Get the top `depth` order-book levels.
    #[instrument(skip(self))]
    pub async fn get_depth(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let raw: RawDepth = self
            .get_data(
                "depth",
                &[("symbol", symbol.to_string()), ("limit", depth.to_string())],
            )
            .await?;
        Ok(raw.into_order_book())
    }

    /// Get the current open interest in contracts.
    #[instrument(skip(self))]
    pub async fn get_open_interest(&self, symbol: &str) -> Result<Option<f64>> {
        let raw: RawOpenInterest = self
            .get_data("open-interest", &[("symbol", symbol.to_string())])
            .await?;
        Ok(raw.size())
    }
}

/// Log a failed request and degrade it to "no data".
fn degrade<T>(what: &str, symbol: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(symbol, error = %e, "{} unavailable", what);
            None
        }
    }
}

#[async_trait]
impl MarketDataSource for BitgetClient {
    async fn ticker(&self, symbol: &str) -> Option<Ticker> {
        degrade("Ticker", symbol, self.get_ticker(symbol).await).flatten()
    }

    async fn candles(&self, symbol: &str, granularity: Granularity, limit: usize) -> Vec<Bar> {
        degrade(
            "Candles",
            symbol,
            self.get_candles(symbol, granularity, limit).await,
        )
        .unwrap_or_default()
    }

    async fn order_book(&self, symbol: &str, depth: usize) -> Option<OrderBook> {
        degrade("Order book", symbol, self.get_depth(symbol, depth).await)
    }

    async fn open_interest(&self, symbol: &str) -> Option<f64> {
        degrade(
            "Open interest",
            symbol,
            self.get_open_interest(symbol).await,
        )
        .flatten()
    }

    async fn tickers(&self) -> Vec<Ticker> {
        degrade("Tickers", "*", self.get_tickers().await).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn client_for(server: &MockServer) -> BitgetClient {
        BitgetClient::new(&ExchangeConfig {
            base_url: server.uri(),
            product_type: "usdt-futures".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "code": "00000",
            "msg": "success",
            "requestTime": 1_700_000_000_000u64,
            "data": data
        }))
    }

    // =========================================================================
    // Endpoint Tests
    // =========================================================================

    #[tokio::test]
    async fn test_ticker_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mix/market/ticker"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("productType", "usdt-futures"))
            .respond_with(ok(json!([{
                "symbol": "BTCUSDT",
                "lastPr": "65000.5",
                "markPrice": "65001",
                "high24h": "66000",
                "low24h": "64000",
                "change24h": "0.0123",
                "fundingRate": "0.0001",
                "usdtVolume": "1500000000",
                "holdingAmount": "52000"
            }])))
            .mount(&server)
            .await;

        let ticker = client_for(&server).ticker("BTCUSDT").await.unwrap();
        assert_eq!(ticker.last_price, 65000.5);
        assert_eq!(ticker.high_24h, Some(66000.0));
        assert_eq!(ticker.funding_rate, 0.0001);
        assert_eq!(ticker.open_interest, Some(52000.0));
    }

    #[tokio::test]
    async fn test_candles_are_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mix/market/candles"))
            .and(query_param("granularity", "5m"))
            .and(query_param("limit", "3"))
            .respond_with(ok(json!([
                ["1700000600000", "3", "3.2", "2.9", "3.1", "120", "372"],
                ["1700000300000", "2", "3.1", "1.9", "3", "100", "300"]
            ])))
            .mount(&server)
            .await;

        let bars = client_for(&server)
            .candles("XYZUSDT", Granularity::FiveMinutes, 3)
            .await;
        assert_eq!(bars.len(), 2);
        assert!(bars[0].open_time < bars[1].open_time);
        assert_eq!(bars[1].close, 3.1);
    }

    #[tokio::test]
    async fn test_open_interest_first_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mix/market/open-interest"))
            .respond_with(ok(json!({
                "openInterestList": [{"symbol": "ETHUSDT", "size": "834512.2"}],
                "ts": "1700000000000"
            })))
            .mount(&server)
            .await;

        let oi = client_for(&server).open_interest("ETHUSDT").await;
        assert_eq!(oi, Some(834512.2));
    }

    #[tokio::test]
    async fn test_depth_levels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mix/market/depth"))
            .and(query_param("limit", "10"))
            .respond_with(ok(json!({
                "bids": [["99.9", "30"]],
                "asks": [["100.1", "50"]],
                "ts": "1700000000000"
            })))
            .mount(&server)
            .await;

        let book = client_for(&server).order_book("XYZUSDT", 10).await.unwrap();
        assert!((book.imbalance(10) - 0.6).abs() < 1e-12);
    }

    // =========================================================================
    // Failure Handling Tests
    // =========================================================================

    #[tokio::test]
    async fn test_http_error_degrades_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.ticker("BTCUSDT").await.is_none());
        assert!(client
            .candles("BTCUSDT", Granularity::OneHour, 10)
            .await
            .is_empty());
        assert!(client.tickers().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_code_degrades_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/mix/market/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "40034",
                "msg": "Parameter does not exist",
                "data": null
            })))
            .mount(&server)
            .await;

        assert!(client_for(&server).ticker("NOPEUSDT").await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_degrades_to_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(client_for(&server).open_interest("BTCUSDT").await.is_none());
    }
}
