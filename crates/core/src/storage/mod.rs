use anyhow::Context;

use crate::domain::recommendation::Recommendation;

pub mod memory;
pub mod recommendations;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Append-only recommendation log.
#[async_trait::async_trait]
pub trait RecommendationStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Every call inserts a new entry; there is no dedup key.
    async fn append(&self, rec: &Recommendation, provider: &str) -> anyhow::Result<()>;

    /// Newest first, at most `limit` entries.
    async fn list(&self, limit: i64) -> anyhow::Result<Vec<Recommendation>>;
}
