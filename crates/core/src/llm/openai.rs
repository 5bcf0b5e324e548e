use crate::config::Settings;
use crate::domain::price::PriceRecord;
use crate::domain::recommendation::Recommendation;
use crate::error::GenerationError;
use crate::llm::{parse, prompt, LlmClient, Provider};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 512;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_openai_api_key()?.to_string();
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    fn request_for(&self, price: &PriceRecord) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt(price),
                },
            ],
        }
    }

    async fn create_completion(&self, req: ChatCompletionRequest) -> anyhow::Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::new(Provider::OpenAI, "request", format!("{e:#}")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| GenerationError::new(Provider::OpenAI, "read_body", format!("{e:#}")))?;
        if !status.is_success() {
            return Err(
                GenerationError::new(Provider::OpenAI, "http", format!("status={status}"))
                    .with_raw_output(text)
                    .into(),
            );
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&text).map_err(|e| {
            GenerationError::new(Provider::OpenAI, "decode", format!("{e}")).with_raw_output(&text)
        })?;
        completion_text(parsed)
    }
}

fn completion_text(res: ChatCompletionResponse) -> anyhow::Result<String> {
    let text = res
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GenerationError::new(Provider::OpenAI, "empty", "no completion text"))?;
    Ok(text)
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn generate_recommendation(
        &self,
        price: &PriceRecord,
    ) -> anyhow::Result<Recommendation> {
        let text = self.create_completion(self.request_for(price)).await?;
        let rec = parse::parse_recommendation(&text, &price.symbol, Provider::OpenAI)?;
        tracing::debug!(
            symbol = %rec.symbol,
            action = %rec.action,
            confidence = %rec.confidence,
            model = %self.model,
            "openai recommendation parsed"
        );
        Ok(rec)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
