use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use cryptodash_core::domain::price::{HistoryPoint, PriceRecord};
use cryptodash_core::domain::recommendation::{MarketAnalysis, Recommendation};
use cryptodash_core::domain::symbols::normalize_symbol;
use cryptodash_core::error::classify;
use cryptodash_core::service::{
    AnalysisService, DEFAULT_CHART_DAYS, DEFAULT_HISTORY_LIMIT, MAX_CHART_DAYS,
};

#[derive(Clone)]
pub struct AppState {
    pub service: AnalysisService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/", get(root))
        .route("/api/crypto/prices", get(get_prices))
        .route("/api/crypto/analysis", get(get_analysis))
        .route(
            "/api/crypto/recommendations/history",
            get(get_recommendation_history),
        )
        .route(
            "/api/crypto/:symbol/recommendation",
            get(get_recommendation),
        )
        .route("/api/crypto/:symbol/history", get(get_price_history))
        .with_state(state)
}

/// Error body returned for every non-2xx answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Logs the full chain and reports it; the caller only sees `detail`.
    fn upstream(err: anyhow::Error, detail: &'static str) -> Self {
        let kind = classify(&err);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(kind = kind.as_str(), error = %format!("{err:#}"), "{detail}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    fn store_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Recommendation store is unavailable",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct Banner {
    message: &'static str,
}

async fn root() -> Json<Banner> {
    Json(Banner {
        message: "Crypto Investment AI API",
    })
}

async fn get_prices(State(state): State<AppState>) -> ApiResult<Vec<PriceRecord>> {
    let prices = state
        .service
        .list_prices()
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch cryptocurrency prices"))?;
    Ok(Json(prices))
}

async fn get_analysis(State(state): State<AppState>) -> ApiResult<Vec<MarketAnalysis>> {
    if !state.service.has_store() {
        return Err(ApiError::store_unavailable());
    }

    let analysis = state
        .service
        .analyze_all()
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to generate market analysis"))?;
    Ok(Json(analysis))
}

fn supported_symbol(state: &AppState, raw: &str) -> Result<String, ApiError> {
    let symbol = normalize_symbol(raw);
    if !state.service.is_supported(&symbol) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Cryptocurrency {symbol} not supported"),
        ));
    }
    Ok(symbol)
}

async fn get_recommendation(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> ApiResult<Recommendation> {
    let symbol = supported_symbol(&state, &symbol)?;
    if !state.service.has_store() {
        return Err(ApiError::store_unavailable());
    }

    let rec = state
        .service
        .analyze_symbol(&symbol)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to generate recommendation"))?;
    Ok(Json(rec))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<String>,
}

/// Parses an optional integer query value, answering 400 with a `detail` body when malformed.
fn parse_query<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
    default: T,
) -> Result<T, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("{name} must be an integer (got {value:?})"),
            )
        }),
    }
}

async fn get_recommendation_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<Recommendation>> {
    if !state.service.has_store() {
        return Err(ApiError::store_unavailable());
    }

    let limit = parse_query("limit", params.limit.as_deref(), DEFAULT_HISTORY_LIMIT)?;
    let history = state
        .service
        .history(limit)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch recommendation history"))?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
struct ChartParams {
    days: Option<String>,
}

async fn get_price_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<ChartParams>,
) -> ApiResult<Vec<HistoryPoint>> {
    let symbol = supported_symbol(&state, &symbol)?;
    let days = parse_query("days", params.days.as_deref(), i64::from(DEFAULT_CHART_DAYS))?;
    if !(1..=i64::from(MAX_CHART_DAYS)).contains(&days) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("days must be between 1 and {MAX_CHART_DAYS}"),
        ));
    }

    let points = state
        .service
        .price_history(&symbol, days as u32)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch price history"))?;
    Ok(Json(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use cryptodash_core::domain::recommendation::{Action, Confidence};
    use cryptodash_core::error::{GenerationError, ProviderError};
    use cryptodash_core::llm::{LlmClient, Provider, UnconfiguredLlm};
    use cryptodash_core::market::MarketDataClient;
    use cryptodash_core::storage::memory::MemoryRecommendationStore;
    use cryptodash_core::storage::RecommendationStore;

    struct FakeMarket {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MarketDataClient for FakeMarket {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_prices(&self, symbols: &[String]) -> anyhow::Result<Vec<PriceRecord>> {
            if self.fail {
                return Err(ProviderError::new("fake", "http", "status=401").into());
            }
            Ok(symbols
                .iter()
                .map(|s| PriceRecord {
                    id: s.to_lowercase(),
                    symbol: s.clone(),
                    name: s.clone(),
                    price: 42.0,
                    percent_change_24h: -3.0,
                    market_cap: 0.0,
                    volume_24h: 0.0,
                    last_updated: Utc::now(),
                })
                .collect())
        }

        async fn fetch_history(
            &self,
            _symbol: &str,
            _days: u32,
        ) -> anyhow::Result<Vec<HistoryPoint>> {
            if self.fail {
                return Err(ProviderError::new("fake", "http", "status=500").into());
            }
            Ok(vec![HistoryPoint {
                date: Utc::now().date_naive(),
                price: 1.0,
            }])
        }
    }

    struct FakeLlm {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LlmClient for FakeLlm {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn generate_recommendation(
            &self,
            price: &PriceRecord,
        ) -> anyhow::Result<Recommendation> {
            if self.fail {
                return Err(GenerationError::new(Provider::Anthropic, "parse", "garbled").into());
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let (action, confidence) = match n % 3 {
                0 => (Action::Buy, Confidence::High),
                1 => (Action::Hold, Confidence::Medium),
                _ => (Action::Sell, Confidence::Low),
            };
            Ok(Recommendation::new(
                &price.symbol,
                action,
                confidence,
                None,
                format!("call {n}"),
            ))
        }
    }

    fn state_with(market_fails: bool, llm_fails: bool, with_store: bool) -> AppState {
        let store = with_store
            .then(|| Arc::new(MemoryRecommendationStore::new()) as Arc<dyn RecommendationStore>);
        AppState {
            service: AnalysisService::new(
                Arc::new(FakeMarket { fail: market_fails }),
                Arc::new(FakeLlm {
                    calls: AtomicUsize::new(0),
                    fail: llm_fails,
                }),
                store,
                vec!["BTC".into(), "ETH".into()],
            ),
        }
    }

    fn state() -> AppState {
        state_with(false, false, true)
    }

    async fn error_parts(err: ApiError) -> (StatusCode, String) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body.detail)
    }

    #[tokio::test]
    async fn prices_one_per_symbol() {
        let Json(prices) = get_prices(State(state())).await.unwrap();
        assert_eq!(prices.len(), 2);
        let symbols: HashSet<_> = prices.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, HashSet::from(["BTC", "ETH"]));
        assert!(prices.iter().all(|p| p.price >= 0.0));
    }

    #[tokio::test]
    async fn provider_failure_is_generic_500_with_message() {
        let err = get_prices(State(state_with(true, false, true)))
            .await
            .unwrap_err();
        let (status, detail) = error_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail, "Failed to fetch cryptocurrency prices");
    }

    #[tokio::test]
    async fn recommendation_shape_and_history_growth() {
        let state = state();
        let mut ids = HashSet::new();
        for _ in 0..3 {
            let Json(rec) = get_recommendation(State(state.clone()), Path("btc".to_string()))
                .await
                .unwrap();
            assert_eq!(rec.symbol, "BTC");
            assert!(matches!(rec.action, Action::Buy | Action::Hold | Action::Sell));
            assert!(matches!(
                rec.confidence,
                Confidence::High | Confidence::Medium | Confidence::Low
            ));
            ids.insert(rec.id);
        }
        assert_eq!(ids.len(), 3);

        let Json(history) =
            get_recommendation_history(State(state), Query(HistoryParams { limit: None }))
                .await
                .unwrap();
        assert!(history.len() >= 3);
    }

    #[tokio::test]
    async fn unsupported_symbol_is_404() {
        let err = get_recommendation(State(state()), Path("shib".to_string()))
            .await
            .unwrap_err();
        let (status, detail) = error_parts(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(detail, "Cryptocurrency SHIB not supported");
    }

    #[tokio::test]
    async fn generation_failure_is_500_and_nothing_persisted() {
        let state = state_with(false, true, true);
        let err = get_recommendation(State(state.clone()), Path("ETH".to_string()))
            .await
            .unwrap_err();
        let (status, _) = error_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let Json(history) =
            get_recommendation_history(State(state), Query(HistoryParams {
                limit: Some("10".into()),
            }))
                .await
                .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn analysis_covers_all_symbols() {
        let Json(analysis) = get_analysis(State(state())).await.unwrap();
        let symbols: Vec<_> = analysis.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert!(analysis.iter().all(|a| a.recommendation.symbol == a.symbol));
    }

    #[tokio::test]
    async fn missing_store_is_503() {
        let state = state_with(false, false, false);
        let err = get_analysis(State(state.clone())).await.unwrap_err();
        assert_eq!(error_parts(err).await.0, StatusCode::SERVICE_UNAVAILABLE);

        let err =
            get_recommendation_history(State(state.clone()), Query(HistoryParams { limit: None }))
                .await
                .unwrap_err();
        assert_eq!(error_parts(err).await.0, StatusCode::SERVICE_UNAVAILABLE);

        // Prices still work without a store.
        assert!(get_prices(State(state)).await.is_ok());
    }

    #[tokio::test]
    async fn price_history_validates_days() {
        let Json(points) = get_price_history(
            State(state()),
            Path("eth".to_string()),
            Query(ChartParams { days: None }),
        )
        .await
        .unwrap();
        assert_eq!(points.len(), 1);

        let err = get_price_history(
            State(state()),
            Path("ETH".to_string()),
            Query(ChartParams {
                days: Some("0".into()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error_parts(err).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_query_values_get_detail_body() {
        for raw in ["-1", "abc", "99999999999"] {
            let err = get_price_history(
                State(state()),
                Path("BTC".to_string()),
                Query(ChartParams {
                    days: Some(raw.into()),
                }),
            )
            .await
            .unwrap_err();
            let (status, detail) = error_parts(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(detail.contains("days"), "{detail}");
        }

        let err = get_recommendation_history(
            State(state()),
            Query(HistoryParams {
                limit: Some("abc".into()),
            }),
        )
        .await
        .unwrap_err();
        let (status, detail) = error_parts(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail, "limit must be an integer (got \"abc\")");
    }

    #[tokio::test]
    async fn missing_llm_key_leaves_prices_up() {
        let state = AppState {
            service: AnalysisService::new(
                Arc::new(FakeMarket { fail: false }),
                Arc::new(UnconfiguredLlm::new(
                    Provider::OpenAI,
                    "API key not configured: OPENAI_API_KEY is required",
                )),
                Some(Arc::new(MemoryRecommendationStore::new()) as Arc<dyn RecommendationStore>),
                vec!["BTC".into()],
            ),
        };

        let Json(prices) = get_prices(State(state.clone())).await.unwrap();
        assert_eq!(prices.len(), 1);

        let err = get_recommendation(State(state), Path("BTC".to_string()))
            .await
            .unwrap_err();
        let (status, detail) = error_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail, "Failed to generate recommendation");
    }

    #[test]
    fn router_builds_with_overlapping_paths() {
        let _ = router(state());
    }
}
