use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cryptodash_core::config::Settings;
use cryptodash_core::llm::{self, LlmClient, Provider, UnconfiguredLlm};
use cryptodash_core::market::coinmarketcap::CoinMarketCapClient;
use cryptodash_core::market::{MarketDataClient, UnconfiguredMarketClient};
use cryptodash_core::service::AnalysisService;
use cryptodash_core::storage::memory::MemoryRecommendationStore;
use cryptodash_core::storage::recommendations::PgRecommendationStore;
use cryptodash_core::storage::RecommendationStore;

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let market = build_market(&settings);
    let llm = build_llm(&settings)?;
    let store = connect_store(&settings).await;

    tracing::info!(
        symbols = settings.symbols.len(),
        llm = llm.provider().as_str(),
        store = store.as_ref().map(|s| s.backend()).unwrap_or("unavailable"),
        "services initialized"
    );

    let service = AnalysisService::new(market, llm, store, settings.symbols.clone());
    let app = routes::router(routes::AppState { service })
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8001);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// A missing CoinMarketCap key leaves the API up; price endpoints then answer 500.
fn build_market(settings: &Settings) -> Arc<dyn MarketDataClient> {
    match CoinMarketCapClient::from_settings(settings) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %format!("{e:#}"),
                "market data client unavailable; starting API in degraded mode"
            );
            Arc::new(UnconfiguredMarketClient::new(
                "coinmarketcap",
                format!("API key not configured: {e:#}"),
            ))
        }
    }
}

/// Same degraded mode for the LLM. An unknown `LLM_PROVIDER` value still stops startup.
fn build_llm(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    let provider = Provider::from_setting(settings.llm_provider.as_deref())?;
    match llm::client_from_settings(settings) {
        Ok(client) => Ok(client),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                provider = provider.as_str(),
                error = %format!("{e:#}"),
                "llm client unavailable; starting API in degraded mode"
            );
            Ok(Arc::new(UnconfiguredLlm::new(
                provider,
                format!("API key not configured: {e:#}"),
            )))
        }
    }
}

/// Postgres when `DATABASE_URL` is set; memory otherwise. A configured but unreachable
/// database leaves the API running without a store (history and analysis answer 503).
async fn connect_store(settings: &Settings) -> Option<Arc<dyn RecommendationStore>> {
    let Ok(db_url) = settings.require_database_url() else {
        tracing::warn!("DATABASE_URL missing; recommendations are kept in memory only");
        return Some(Arc::new(MemoryRecommendationStore::new()) as Arc<dyn RecommendationStore>);
    };

    let pool: PgPool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return None;
        }
    };

    match cryptodash_core::storage::migrate(&pool).await {
        Ok(()) => Some(Arc::new(PgRecommendationStore::new(pool)) as Arc<dyn RecommendationStore>),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            None
        }
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let Some(origins) = settings.cors_origin_list() else {
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
