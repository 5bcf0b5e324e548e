use crate::config::Settings;
use crate::domain::price::{HistoryPoint, PriceRecord};
use crate::error::ProviderError;
use crate::market::MarketDataClient;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const PROVIDER: &str = "coinmarketcap";
const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const QUOTES_LATEST_PATH: &str = "/v1/cryptocurrency/quotes/latest";
const QUOTES_HISTORICAL_PATH: &str = "/v2/cryptocurrency/quotes/historical";
const CONVERT: &str = "USD";

#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CoinMarketCapClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_coinmarketcap_api_key()?.to_string();
        let base_url = std::env::var("COINMARKETCAP_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("COINMARKETCAP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build coinmarketcap http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("X-CMC_PRO_API_KEY", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::new(PROVIDER, "request", format!("{e:#}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ProviderError::new(PROVIDER, "read_body", format!("{e:#}")))?;

        if !status.is_success() {
            return Err(ProviderError::new(
                PROVIDER,
                "http",
                format!("status={status} path={path} body={}", truncate(&text, 512)),
            )
            .into());
        }

        serde_json::from_str::<Value>(&text).map_err(|e| {
            ProviderError::new(PROVIDER, "decode", format!("response is not valid JSON: {e}"))
                .into()
        })
    }
}

#[async_trait::async_trait]
impl MarketDataClient for CoinMarketCapClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_prices(&self, symbols: &[String]) -> Result<Vec<PriceRecord>> {
        anyhow::ensure!(!symbols.is_empty(), "symbol list must be non-empty");

        let raw = self
            .get_json(
                QUOTES_LATEST_PATH,
                &[("symbol", symbols.join(",")), ("convert", CONVERT.to_string())],
            )
            .await?;

        let prices = parse_quotes_latest(raw, symbols)?;
        tracing::debug!(count = prices.len(), "fetched latest quotes");
        Ok(prices)
    }

    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<HistoryPoint>> {
        let time_end = Utc::now();
        let time_start = time_end - ChronoDuration::days(i64::from(days));

        let raw = self
            .get_json(
                QUOTES_HISTORICAL_PATH,
                &[
                    ("symbol", symbol.to_string()),
                    ("time_start", time_start.to_rfc3339()),
                    ("time_end", time_end.to_rfc3339()),
                    ("interval", "daily".to_string()),
                    ("count", days.to_string()),
                    ("convert", CONVERT.to_string()),
                ],
            )
            .await?;

        parse_quotes_historical(&raw, symbol)
    }
}

#[derive(Debug, Deserialize)]
struct QuotesLatestResponse {
    data: HashMap<String, CoinEntry>,
}

#[derive(Debug, Deserialize)]
struct CoinEntry {
    id: u64,
    name: String,
    symbol: String,
    quote: HashMap<String, UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: Option<f64>,
    percent_change_24h: Option<f64>,
    market_cap: Option<f64>,
    volume_24h: Option<f64>,
    last_updated: DateTime<Utc>,
}

/// Maps a `quotes/latest` body onto one record per requested symbol, in request order.
/// A requested symbol missing from the body is an error; so is a negative or missing price.
pub fn parse_quotes_latest(raw: Value, symbols: &[String]) -> Result<Vec<PriceRecord>> {
    let mut parsed = serde_json::from_value::<QuotesLatestResponse>(raw).map_err(|e| {
        ProviderError::new(PROVIDER, "decode", format!("unexpected quotes/latest shape: {e}"))
    })?;

    let mut out = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let entry = parsed.data.remove(symbol).ok_or_else(|| {
            ProviderError::new(PROVIDER, "validate", format!("no quote returned for {symbol}"))
        })?;
        out.push(into_price_record(entry)?);
    }
    Ok(out)
}

fn into_price_record(mut entry: CoinEntry) -> Result<PriceRecord> {
    let quote = entry.quote.remove(CONVERT).ok_or_else(|| {
        ProviderError::new(
            PROVIDER,
            "validate",
            format!("{} has no {CONVERT} quote", entry.symbol),
        )
    })?;

    let price = quote
        .price
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| {
            ProviderError::new(
                PROVIDER,
                "validate",
                format!("{} has missing or invalid price {:?}", entry.symbol, quote.price),
            )
        })?;

    Ok(PriceRecord {
        id: entry.id.to_string(),
        symbol: entry.symbol,
        name: entry.name,
        price,
        percent_change_24h: quote.percent_change_24h.unwrap_or(0.0),
        market_cap: quote.market_cap.unwrap_or(0.0),
        volume_24h: quote.volume_24h.unwrap_or(0.0),
        last_updated: quote.last_updated,
    })
}

/// Accepts both the v2 shape (`data.SYM` is an array of coins) and the v1 shape (`data` is the
/// coin itself). Multiple quotes on one day keep the last one.
pub fn parse_quotes_historical(raw: &Value, symbol: &str) -> Result<Vec<HistoryPoint>> {
    let data = raw
        .get("data")
        .ok_or_else(|| ProviderError::new(PROVIDER, "decode", "historical body has no data"))?;

    let coin = match data.get(symbol) {
        Some(Value::Array(coins)) => coins.first(),
        Some(coin @ Value::Object(_)) => Some(coin),
        _ if data.get("quotes").is_some() => Some(data),
        _ => None,
    }
    .ok_or_else(|| {
        ProviderError::new(PROVIDER, "validate", format!("no history returned for {symbol}"))
    })?;

    let quotes = coin
        .get("quotes")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::new(PROVIDER, "decode", "history entry has no quotes"))?;

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for q in quotes {
        let Some(point) = history_point(q) else {
            tracing::debug!(%symbol, quote = %q, "skipping unparseable history quote");
            continue;
        };
        by_date.insert(point.date, point.price);
    }

    Ok(by_date
        .into_iter()
        .map(|(date, price)| HistoryPoint { date, price })
        .collect())
}

fn history_point(q: &Value) -> Option<HistoryPoint> {
    let usd = q.get("quote")?.get(CONVERT)?;
    let price = usd.get("price")?.as_f64()?;
    let ts = q
        .get("timestamp")
        .or_else(|| usd.get("timestamp"))?
        .as_str()?;
    let ts = DateTime::parse_from_rfc3339(ts).ok()?;
    Some(HistoryPoint {
        date: ts.with_timezone(&Utc).date_naive(),
        price,
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
