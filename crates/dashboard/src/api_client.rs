use std::time::Duration;

use anyhow::Context;
use cryptodash_core::domain::price::{HistoryPoint, PriceRecord};
use cryptodash_core::domain::recommendation::Recommendation;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Thin client for the dashboard API; every error becomes one readable message.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardApi {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let timeout_secs = std::env::var("CRYPTODASH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build dashboard http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn prices(&self) -> anyhow::Result<Vec<PriceRecord>> {
        self.get_json("/api/crypto/prices", &[]).await
    }

    pub async fn recommendation(&self, symbol: &str) -> anyhow::Result<Recommendation> {
        self.get_json(&format!("/api/crypto/{symbol}/recommendation"), &[])
            .await
    }

    pub async fn price_history(
        &self,
        symbol: &str,
        days: u32,
    ) -> anyhow::Result<Vec<HistoryPoint>> {
        self.get_json(
            &format!("/api/crypto/{symbol}/history"),
            &[("days", days.to_string())],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = res.status();
        let text = res.text().await.context("failed to read API response")?;
        if !status.is_success() {
            anyhow::bail!(error_message(status.as_u16(), &text));
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected response from {path}"))
    }
}

/// `HTTP <status>: <detail>`, falling back to the raw body when it is not an error object.
fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| body.trim().to_string());
    if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            error_message(500, r#"{"detail":"Failed to fetch cryptocurrency prices"}"#),
            "HTTP 500: Failed to fetch cryptocurrency prices"
        );
        assert_eq!(error_message(502, "bad gateway"), "HTTP 502: bad gateway");
        assert_eq!(error_message(503, ""), "HTTP 503");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = DashboardApi::new("http://localhost:8001/").unwrap();
        assert_eq!(api.base_url, "http://localhost:8001");
    }
}
