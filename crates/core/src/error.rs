use crate::llm::Provider;
use std::fmt;

/// Market data provider unreachable, non-2xx, or returned an unexpected shape.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: &'static str,
    pub stage: &'static str,
    pub detail: String,
}

/// LLM call failed or its completion could not be parsed into a recommendation.
#[derive(Debug, Clone)]
pub struct GenerationError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

/// Persistence read or write failed.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub op: &'static str,
    pub detail: String,
}

impl ProviderError {
    pub fn new(provider: &'static str, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
        }
    }
}

impl GenerationError {
    pub fn new(provider: Provider, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "market data error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error (op={}): {}", self.op, self.detail)
    }
}

impl std::error::Error for ProviderError {}
impl std::error::Error for GenerationError {}
impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Provider,
    Generation,
    Store,
    Other,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Provider => "provider",
            ErrorKind::Generation => "generation",
            ErrorKind::Store => "store",
            ErrorKind::Other => "other",
        }
    }
}

/// Finds the first taxonomy error anywhere in the chain.
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if cause.is::<ProviderError>() {
            return ErrorKind::Provider;
        }
        if cause.is::<GenerationError>() {
            return ErrorKind::Generation;
        }
        if cause.is::<StoreError>() {
            return ErrorKind::Store;
        }
    }
    ErrorKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_sees_through_context() {
        let err = Err::<(), _>(ProviderError::new("coinmarketcap", "http", "status=500"))
            .context("fetch prices")
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Provider);

        let err = anyhow::Error::new(StoreError {
            op: "append",
            detail: "boom".into(),
        });
        assert_eq!(classify(&err), ErrorKind::Store);

        assert_eq!(classify(&anyhow::anyhow!("plain")), ErrorKind::Other);
    }

    #[test]
    fn generation_error_display_names_stage() {
        let err = GenerationError::new(Provider::OpenAI, "parse", "missing CONFIDENCE");
        assert_eq!(
            err.to_string(),
            "LLM error (provider=OpenAI, stage=parse): missing CONFIDENCE"
        );
    }
}
