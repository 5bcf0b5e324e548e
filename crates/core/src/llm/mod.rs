use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::domain::price::PriceRecord;
use crate::domain::recommendation::Recommendation;
use crate::error::GenerationError;

pub mod anthropic;
pub mod openai;
pub mod parse;
pub mod prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
        }
    }

    /// `LLM_PROVIDER` value; unset means OpenAI.
    pub fn from_setting(raw: Option<&str>) -> anyhow::Result<Self> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("openai") => Ok(Provider::OpenAI),
            Some("anthropic") => Ok(Provider::Anthropic),
            Some(other) => anyhow::bail!("unsupported LLM_PROVIDER: {other}"),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One fresh recommendation for `price`; never a cached or fallback value.
    async fn generate_recommendation(&self, price: &PriceRecord)
        -> anyhow::Result<Recommendation>;
}

pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn LlmClient>> {
    let provider = Provider::from_setting(settings.llm_provider.as_deref())?;
    let client: Arc<dyn LlmClient> = match provider {
        Provider::OpenAI => Arc::new(
            openai::OpenAiClient::from_settings(settings).context("openai client init failed")?,
        ),
        Provider::Anthropic => Arc::new(
            anthropic::AnthropicClient::from_settings(settings)
                .context("anthropic client init failed")?,
        ),
    };
    Ok(client)
}

/// Answers every generation request with a `config` stage [`GenerationError`].
#[derive(Debug, Clone)]
pub struct UnconfiguredLlm {
    provider: Provider,
    reason: String,
}

impl UnconfiguredLlm {
    pub fn new(provider: Provider, reason: impl Into<String>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for UnconfiguredLlm {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate_recommendation(
        &self,
        _price: &PriceRecord,
    ) -> anyhow::Result<Recommendation> {
        Err(GenerationError::new(self.provider, "config", self.reason.clone()).into())
    }
}
