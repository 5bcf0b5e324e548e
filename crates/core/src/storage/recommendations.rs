use crate::domain::recommendation::{Action, Confidence, Recommendation};
use crate::error::StoreError;
use crate::storage::RecommendationStore;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgRecommendationStore {
    pool: sqlx::PgPool,
}

impl PgRecommendationStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

type RecommendationRow = (
    Uuid,
    String,
    String,
    String,
    Option<f64>,
    String,
    DateTime<Utc>,
);

#[async_trait::async_trait]
impl RecommendationStore for PgRecommendationStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn append(&self, rec: &Recommendation, provider: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO recommendations \
             (id, symbol, action, confidence, price_target, reasoning, provider, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(rec.id)
        .bind(&rec.symbol)
        .bind(rec.action.as_str())
        .bind(rec.confidence.as_str())
        .bind(rec.price_target)
        .bind(&rec.reasoning)
        .bind(provider)
        .bind(rec.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError {
            op: "append",
            detail: format!("insert recommendations failed: {e}"),
        })?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> anyhow::Result<Vec<Recommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(
            "SELECT id, symbol, action, confidence, price_target, reasoning, created_at \
             FROM recommendations \
             ORDER BY created_at DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError {
            op: "list",
            detail: format!("select recommendations failed: {e}"),
        })?;

        rows.into_iter().map(row_into_recommendation).collect()
    }
}

fn row_into_recommendation(row: RecommendationRow) -> anyhow::Result<Recommendation> {
    let (id, symbol, action, confidence, price_target, reasoning, created_at) = row;
    let invalid = |e: anyhow::Error| StoreError {
        op: "list",
        detail: format!("invalid row in DB for id={id}: {e}"),
    };

    Ok(Recommendation {
        id,
        symbol,
        action: action.parse::<Action>().map_err(invalid)?,
        confidence: confidence.parse::<Confidence>().map_err(invalid)?,
        price_target,
        reasoning,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorKind};
    use chrono::TimeZone;

    #[test]
    fn decodes_row_columns() {
        let id = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2026, 1, 27, 10, 0, 0).unwrap();
        let rec = row_into_recommendation((
            id,
            "SOL".into(),
            "SELL".into(),
            "HIGH".into(),
            Some(120.0),
            "Overextended.".into(),
            at,
        ))
        .unwrap();

        assert_eq!(rec.id, id);
        assert_eq!(rec.action, Action::Sell);
        assert_eq!(rec.confidence, Confidence::High);
        assert_eq!(rec.created_at, at);
    }

    #[test]
    fn corrupt_action_is_store_error() {
        let err = row_into_recommendation((
            Uuid::new_v4(),
            "SOL".into(),
            "MAYBE".into(),
            "HIGH".into(),
            None,
            "x".into(),
            Utc::now(),
        ))
        .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Store);
    }
}
