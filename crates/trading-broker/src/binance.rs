//! Binance spot REST integration.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{header, Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeClient;
use trading_core::types::{
    AccountSnapshot, Balance, Bar, MarketOrderRequest, OrderReceipt, OrderStatus, Timeframe,
};
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance error code for an unknown order id.
const ORDER_DOES_NOT_EXIST: i64 = -2013;

/// Binance API configuration.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// How long a signed request stays valid on the server
    pub recv_window_ms: u64,
    pub request_timeout: Duration,
}

impl BinanceConfig {
    /// Config for signed trading calls.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            api_secret: Some(api_secret.into()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_secret: None,
            recv_window_ms: 5000,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BinanceAccount {
    balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
struct BinanceBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrder {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    status: String,
    executed_qty: String,
}

#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    code: i64,
    msg: String,
}

/// Binance spot client.
pub struct BinanceClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(config: BinanceConfig) -> Result<Self, ExchangeError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "X-MBX-APIKEY",
                header::HeaderValue::from_str(api_key)
                    .map_err(|e| ExchangeError::Auth(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Client for market data only. Signed calls fail with `Auth`.
    pub fn public(base_url: impl Into<String>) -> Result<Self, ExchangeError> {
        Self::new(BinanceConfig::default().with_base_url(base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}?{}", self.url(path), encode_params(params));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(resp).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let secret = self
            .config
            .api_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ExchangeError::Auth("API secret not configured".into()))?;
        if self.config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ExchangeError::Auth("API key not configured".into()));
        }

        let query = signed_query(
            params,
            self.config.recv_window_ms,
            chrono::Utc::now().timestamp_millis(),
            secret,
        )?;

        let url = format!("{}?{}", self.url(path), query);
        let resp = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(transport_error)?;
        Self::read_json(resp).await
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ExchangeError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }
        resp.json()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn get_klines(
        &self,
        symbol: &str,
        interval: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<Vec<Value>> = self.public_get("/api/v3/klines", &params).await?;
        debug!("Received {} klines for {}", rows.len(), symbol);
        rows.iter().map(|row| parse_kline(row)).collect()
    }

    async fn get_account(&self) -> Result<AccountSnapshot, ExchangeError> {
        let account: BinanceAccount = self.signed(Method::GET, "/api/v3/account", &[]).await?;

        let mut balances = HashMap::new();
        for b in account.balances {
            let balance = Balance::new(parse_decimal(&b.free)?, parse_decimal(&b.locked)?);
            balances.insert(b.asset, balance);
        }
        Ok(AccountSnapshot::new(balances))
    }

    async fn create_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderReceipt, ExchangeError> {
        let params = [
            ("symbol", request.symbol.clone()),
            ("side", request.side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", request.quantity.normalize().to_string()),
            ("newClientOrderId", request.client_order_id.clone()),
            ("newOrderRespType", "RESULT".to_string()),
        ];

        debug!("Submitting order: {:?}", params);
        let order: BinanceOrder = self.signed(Method::POST, "/api/v3/order", &params).await?;

        info!(
            "Order submitted: {} {} {} ({})",
            request.side, request.quantity, order.symbol, order.status
        );
        parse_order(order)
    }

    async fn get_order(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<OrderReceipt, ExchangeError> {
        let params = [
            ("symbol", symbol.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        let order: BinanceOrder = self.signed(Method::GET, "/api/v3/order", &params).await?;
        parse_order(order)
    }

    fn name(&self) -> &str {
        "Binance"
    }
}

fn encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// `params`, then `recvWindow` and `timestamp`, then the `signature` over
/// everything before it.
fn signed_query(
    params: &[(&str, String)],
    recv_window_ms: u64,
    timestamp_ms: i64,
    secret: &str,
) -> Result<String, ExchangeError> {
    let mut query = encode_params(params);
    if !query.is_empty() {
        query.push('&');
    }
    query.push_str(&format!(
        "recvWindow={}&timestamp={}",
        recv_window_ms, timestamp_ms
    ));
    let signature = sign(secret, &query)?;
    query.push_str("&signature=");
    query.push_str(&signature);
    Ok(query)
}

/// Hex HMAC-SHA256 of the query string.
fn sign(secret: &str, query: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(e.to_string()))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn transport_error(e: reqwest::Error) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::Transport(format!("request timed out: {}", e))
    } else {
        ExchangeError::Transport(e.to_string())
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ExchangeError {
    let parsed = serde_json::from_str::<BinanceErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| format!("{} (code {})", b.msg, b.code))
        .unwrap_or_else(|| body.to_string());

    if parsed.map_or(false, |b| b.code == ORDER_DOES_NOT_EXIST) {
        return ExchangeError::OrderNotFound(message);
    }

    match status.as_u16() {
        401 | 403 => ExchangeError::Auth(message),
        418 | 429 => ExchangeError::RateLimited(message),
        code if code >= 500 => ExchangeError::Api {
            status: code,
            message,
        },
        _ => ExchangeError::Validation(message),
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, ExchangeError> {
    s.parse()
        .map_err(|_| ExchangeError::Decode(format!("invalid decimal '{}'", s)))
}

fn decimal_field(row: &[Value], index: usize) -> Result<Decimal, ExchangeError> {
    row.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ExchangeError::Decode(format!("kline field {} missing", index)))
        .and_then(parse_decimal)
}

/// `[open_time, open, high, low, close, volume, close_time, ...]`
fn parse_kline(row: &[Value]) -> Result<Bar, ExchangeError> {
    let timestamp = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ExchangeError::Decode("kline open time missing".into()))?;

    Ok(Bar::new(
        timestamp,
        decimal_field(row, 1)?,
        decimal_field(row, 2)?,
        decimal_field(row, 3)?,
        decimal_field(row, 4)?,
        decimal_field(row, 5)?,
    ))
}

fn parse_status(status: &str) -> Result<OrderStatus, ExchangeError> {
    match status {
        "FILLED" => Ok(OrderStatus::Filled),
        "NEW" | "PARTIALLY_FILLED" | "PENDING_NEW" => Ok(OrderStatus::Pending),
        "REJECTED" | "EXPIRED" | "CANCELED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Rejected),
        other => Err(ExchangeError::Decode(format!("Unknown order status: {}", other))),
    }
}

fn parse_order(order: BinanceOrder) -> Result<OrderReceipt, ExchangeError> {
    Ok(OrderReceipt {
        exchange_order_id: order.order_id.to_string(),
        client_order_id: order.client_order_id,
        symbol: order.symbol,
        status: parse_status(&order.status)?,
        executed_quantity: parse_decimal(&order.executed_qty)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::types::Side;

    #[test]
    fn test_signature_matches_reference() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_layout() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let params = [
            ("symbol", "LTCBTC".to_string()),
            ("side", "BUY".to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", "1".to_string()),
            ("price", "0.1".to_string()),
        ];

        let query = signed_query(&params, 5000, 1499827319559, secret).unwrap();
        assert_eq!(
            query,
            "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1\
             &recvWindow=5000&timestamp=1499827319559\
             &signature=c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );

        // Parameterless calls start with the receive window
        let query = signed_query(&[], 5000, 1, secret).unwrap();
        let (unsigned, signature) = query.split_once("&signature=").unwrap();
        assert_eq!(unsigned, "recvWindow=5000&timestamp=1");
        assert_eq!(signature, sign(secret, unsigned).unwrap());
    }

    #[test]
    fn test_parse_kline() {
        let row: Vec<Value> = serde_json::from_str(
            r#"[1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
                "148976.11427815", 1499644799999, "2434.19055334", 308, "1756.87402397",
                "28.46694368", "0"]"#,
        )
        .unwrap();

        let bar = parse_kline(&row).unwrap();
        assert_eq!(bar.timestamp, 1499040000000);
        assert_eq!(bar.open, dec!(0.01634790));
        assert_eq!(bar.close, dec!(0.01577100));
        assert_eq!(bar.volume, dec!(148976.11427815));
    }

    #[test]
    fn test_parse_kline_rejects_garbage() {
        let row: Vec<Value> = serde_json::from_str(r#"[1, "abc", "1", "1", "1", "1"]"#).unwrap();
        assert!(matches!(parse_kline(&row), Err(ExchangeError::Decode(_))));
        assert!(parse_kline(&[]).is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(parse_status("FILLED").unwrap(), OrderStatus::Filled);
        assert_eq!(parse_status("NEW").unwrap(), OrderStatus::Pending);
        assert_eq!(parse_status("PARTIALLY_FILLED").unwrap(), OrderStatus::Pending);
        assert_eq!(parse_status("EXPIRED").unwrap(), OrderStatus::Rejected);
        assert_eq!(parse_status("CANCELED").unwrap(), OrderStatus::Rejected);
        assert!(parse_status("UNKNOWN").is_err());
    }

    #[test]
    fn test_http_error_mapping() {
        let body = r#"{"code":-1013,"msg":"Filter failure: LOT_SIZE"}"#;
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, body),
            ExchangeError::Validation("Filter failure: LOT_SIZE (code -1013)".into())
        );
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "{}"),
            ExchangeError::Auth(_)
        ));
        assert!(error_for_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(error_for_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!error_for_status(StatusCode::NOT_FOUND, "").is_retryable());

        let body = r#"{"code":-2013,"msg":"Order does not exist."}"#;
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, body),
            ExchangeError::OrderNotFound(_)
        ));
    }

    #[test]
    fn test_parse_order_result() {
        let order: BinanceOrder = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","orderId":28,"orderListId":-1,
                "clientOrderId":"mac-abc","transactTime":1507725176595,
                "price":"0.00000000","origQty":"0.00200000","executedQty":"0.00200000",
                "status":"FILLED","timeInForce":"GTC","type":"MARKET","side":"BUY"}"#,
        )
        .unwrap();

        let receipt = parse_order(order).unwrap();
        assert_eq!(receipt.exchange_order_id, "28");
        assert_eq!(receipt.client_order_id, "mac-abc");
        assert_eq!(receipt.status, OrderStatus::Filled);
        assert_eq!(receipt.executed_quantity, dec!(0.002));
    }

    #[tokio::test]
    async fn test_public_client_cannot_sign() {
        let client = BinanceClient::public("http://127.0.0.1:9").unwrap();

        let err = client.get_account().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));

        let request = MarketOrderRequest::new("BTCUSDT", Side::Buy, dec!(0.001));
        let err = client.create_market_order(&request).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Auth(_)));
    }
}
