use crate::domain::price::{HistoryPoint, PriceRecord};
use crate::error::ProviderError;

pub mod coinmarketcap;

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One record per requested symbol, in request order.
    async fn fetch_prices(&self, symbols: &[String]) -> anyhow::Result<Vec<PriceRecord>>;

    /// Daily closes for the trailing `days`, oldest first.
    async fn fetch_history(&self, symbol: &str, days: u32) -> anyhow::Result<Vec<HistoryPoint>>;
}

/// Stands in for a provider that could not be built at startup. Every call fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredMarketClient {
    provider: &'static str,
    reason: String,
}

impl UnconfiguredMarketClient {
    pub fn new(provider: &'static str, reason: impl Into<String>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }

    fn error(&self) -> anyhow::Error {
        ProviderError::new(self.provider, "config", self.reason.clone()).into()
    }
}

#[async_trait::async_trait]
impl MarketDataClient for UnconfiguredMarketClient {
    fn provider_name(&self) -> &'static str {
        self.provider
    }

    async fn fetch_prices(&self, _symbols: &[String]) -> anyhow::Result<Vec<PriceRecord>> {
        Err(self.error())
    }

    async fn fetch_history(&self, _symbol: &str, _days: u32) -> anyhow::Result<Vec<HistoryPoint>> {
        Err(self.error())
    }
}
