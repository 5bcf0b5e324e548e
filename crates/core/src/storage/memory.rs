use crate::domain::recommendation::Recommendation;
use crate::storage::RecommendationStore;
use tokio::sync::RwLock;

/// Process-local store for running without `DATABASE_URL`. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRecommendationStore {
    entries: RwLock<Vec<Recommendation>>,
}

impl MemoryRecommendationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl RecommendationStore for MemoryRecommendationStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, rec: &Recommendation, _provider: &str) -> anyhow::Result<()> {
        self.entries.write().await.push(rec.clone());
        Ok(())
    }

    async fn list(&self, limit: i64) -> anyhow::Result<Vec<Recommendation>> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let guard = self.entries.read().await;

        // Later inserts win ties on created_at.
        let mut out: Vec<Recommendation> = guard.iter().rev().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }
}
