use std::sync::Arc;

use anyhow::Context;

use crate::domain::price::{HistoryPoint, PriceRecord};
use crate::domain::recommendation::{MarketAnalysis, Recommendation};
use crate::domain::symbols::normalize_symbol;
use crate::error::{ProviderError, StoreError};
use crate::llm::LlmClient;
use crate::market::MarketDataClient;
use crate::storage::RecommendationStore;

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 1000;
pub const DEFAULT_CHART_DAYS: u32 = 7;
pub const MAX_CHART_DAYS: u32 = 90;

/// Composes the market data client, the LLM client and the store.
///
/// Holds no mutable state of its own; every analysis call regenerates and persists.
#[derive(Clone)]
pub struct AnalysisService {
    market: Arc<dyn MarketDataClient>,
    llm: Arc<dyn LlmClient>,
    store: Option<Arc<dyn RecommendationStore>>,
    symbols: Arc<[String]>,
}

impl AnalysisService {
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        llm: Arc<dyn LlmClient>,
        store: Option<Arc<dyn RecommendationStore>>,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            market,
            llm,
            store,
            symbols: symbols.into(),
        }
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn require_store(&self) -> anyhow::Result<&Arc<dyn RecommendationStore>> {
        self.store.as_ref().ok_or_else(|| {
            StoreError {
                op: "connect",
                detail: "no recommendation store configured".to_string(),
            }
            .into()
        })
    }

    pub async fn list_prices(&self) -> anyhow::Result<Vec<PriceRecord>> {
        self.market
            .fetch_prices(&self.symbols)
            .await
            .context("fetch prices failed")
    }

    /// Generates and persists one recommendation per configured symbol, in order. Stops at the
    /// first failure; entries persisted before it stay persisted.
    pub async fn analyze_all(&self) -> anyhow::Result<Vec<MarketAnalysis>> {
        let store = self.require_store()?;
        let prices = self.list_prices().await?;

        let mut out = Vec::with_capacity(prices.len());
        for price in &prices {
            let rec = self
                .generate_and_persist(store.as_ref(), price)
                .await
                .with_context(|| format!("analysis failed for {}", price.symbol))?;
            out.push(MarketAnalysis::new(price, rec));
        }

        tracing::info!(count = out.len(), "market analysis complete");
        Ok(out)
    }

    pub async fn analyze_symbol(&self, symbol: &str) -> anyhow::Result<Recommendation> {
        let symbol = normalize_symbol(symbol);
        anyhow::ensure!(self.is_supported(&symbol), "unsupported symbol: {symbol}");
        let store = self.require_store()?;

        let prices = self
            .market
            .fetch_prices(std::slice::from_ref(&symbol))
            .await
            .with_context(|| format!("fetch price failed for {symbol}"))?;
        let price = prices
            .into_iter()
            .find(|p| p.symbol == symbol)
            .ok_or_else(|| {
                ProviderError::new(
                    self.market.provider_name(),
                    "validate",
                    format!("price data not found for {symbol}"),
                )
            })?;

        self.generate_and_persist(store.as_ref(), &price).await
    }

    pub async fn history(&self, limit: i64) -> anyhow::Result<Vec<Recommendation>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        self.require_store()?
            .list(limit)
            .await
            .context("list recommendation history failed")
    }

    pub async fn price_history(
        &self,
        symbol: &str,
        days: u32,
    ) -> anyhow::Result<Vec<HistoryPoint>> {
        let symbol = normalize_symbol(symbol);
        anyhow::ensure!(self.is_supported(&symbol), "unsupported symbol: {symbol}");
        anyhow::ensure!(
            (1..=MAX_CHART_DAYS).contains(&days),
            "days must be 1..={MAX_CHART_DAYS} (got {days})"
        );

        self.market
            .fetch_history(&symbol, days)
            .await
            .with_context(|| format!("fetch price history failed for {symbol}"))
    }

    async fn generate_and_persist(
        &self,
        store: &dyn RecommendationStore,
        price: &PriceRecord,
    ) -> anyhow::Result<Recommendation> {
        let provider = self.llm.provider();
        let rec = self.llm.generate_recommendation(price).await?;
        store.append(&rec, provider.as_str()).await?;

        tracing::info!(
            symbol = %rec.symbol,
            id = %rec.id,
            action = %rec.action,
            confidence = %rec.confidence,
            provider = provider.as_str(),
            store = store.backend(),
            "persisted recommendation"
        );
        Ok(rec)
    }
}
