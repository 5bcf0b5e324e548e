pub mod domain;
pub mod error;
pub mod llm;
pub mod market;
pub mod service;
pub mod storage;

pub mod config {
    use anyhow::Context;

    use crate::domain::symbols;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub coinmarketcap_api_key: Option<String>,
        pub openai_api_key: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub llm_provider: Option<String>,
        pub sentry_dsn: Option<String>,
        pub cors_origins: Option<String>,
        pub symbols: Vec<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let symbols = match std::env::var("CRYPTO_SYMBOLS").ok() {
                Some(raw) => symbols::parse_symbol_list(&raw)
                    .context("CRYPTO_SYMBOLS must list at least one ticker")?,
                None => symbols::default_symbols(),
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                coinmarketcap_api_key: std::env::var("COINMARKETCAP_API_KEY").ok(),
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                llm_provider: std::env::var("LLM_PROVIDER").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                cors_origins: std::env::var("CORS_ORIGINS").ok(),
                symbols,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_coinmarketcap_api_key(&self) -> anyhow::Result<&str> {
            self.coinmarketcap_api_key
                .as_deref()
                .context("COINMARKETCAP_API_KEY is required")
        }

        pub fn require_openai_api_key(&self) -> anyhow::Result<&str> {
            self.openai_api_key
                .as_deref()
                .context("OPENAI_API_KEY is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        /// Comma-separated origins; `None` means any origin is allowed.
        pub fn cors_origin_list(&self) -> Option<Vec<String>> {
            let raw = self.cors_origins.as_deref()?.trim();
            if raw.is_empty() || raw == "*" {
                return None;
            }
            Some(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )
        }
    }

}
