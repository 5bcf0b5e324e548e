use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use cryptodash_core::domain::price::{HistoryPoint, PriceRecord};
use cryptodash_core::domain::recommendation::Recommendation;

/// Result of a background fetch, delivered to the task that owns [`ViewState`].
#[derive(Debug)]
pub enum Event {
    Prices(Result<Vec<PriceRecord>, String>),
    Analysis {
        symbol: String,
        result: Result<Recommendation, String>,
    },
    Chart {
        symbol: String,
        result: Result<Vec<HistoryPoint>, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartState {
    Loading,
    Ready(Vec<HistoryPoint>),
    Unavailable,
}

#[derive(Debug, Default)]
pub struct ViewState {
    prices: Vec<PriceRecord>,
    recommendations: HashMap<String, Recommendation>,
    analyzing: BTreeSet<String>,
    error: Option<String>,
    charts: HashMap<String, ChartState>,
    last_refresh: Option<DateTime<Utc>>,
}

impl ViewState {
    pub fn prices(&self) -> &[PriceRecord] {
        &self.prices
    }

    pub fn recommendation(&self, symbol: &str) -> Option<&Recommendation> {
        self.recommendations.get(symbol)
    }

    pub fn is_analyzing(&self, symbol: &str) -> bool {
        self.analyzing.contains(symbol)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn chart(&self, symbol: &str) -> Option<&ChartState> {
        self.charts.get(symbol)
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Last error wins.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Applies a fetch result. Returns the symbols whose chart should be fetched now because
    /// their card appeared for the first time.
    pub fn apply(&mut self, event: Event) -> Vec<String> {
        match event {
            Event::Prices(result) => return self.apply_prices(result),
            Event::Analysis { symbol, result } => self.finish_analysis(&symbol, result),
            Event::Chart { symbol, result } => self.set_chart(&symbol, result),
        }
        Vec::new()
    }

    fn apply_prices(&mut self, result: Result<Vec<PriceRecord>, String>) -> Vec<String> {
        match result {
            Ok(prices) => {
                self.prices = prices;
                self.error = None;
                self.last_refresh = Some(Utc::now());

                let mut mounted = Vec::new();
                for p in &self.prices {
                    if !self.charts.contains_key(&p.symbol) {
                        self.charts.insert(p.symbol.clone(), ChartState::Loading);
                        mounted.push(p.symbol.clone());
                    }
                }
                mounted
            }
            Err(message) => {
                // Stale prices are not shown next to an error.
                self.prices.clear();
                self.set_error(format!("Failed to fetch prices: {message}"));
                Vec::new()
            }
        }
    }

    /// Marks `symbol` in flight. Refused if it is already in flight or has no card.
    pub fn begin_analysis(&mut self, symbol: &str) -> bool {
        if !self.prices.iter().any(|p| p.symbol == symbol) {
            self.set_error(format!("Unknown symbol {symbol}"));
            return false;
        }
        self.analyzing.insert(symbol.to_string())
    }

    fn finish_analysis(&mut self, symbol: &str, result: Result<Recommendation, String>) {
        self.analyzing.remove(symbol);
        match result {
            Ok(rec) => {
                self.recommendations.insert(symbol.to_string(), rec);
            }
            Err(message) => self.set_error(format!("Failed to analyze {symbol}: {message}")),
        }
    }

    fn set_chart(&mut self, symbol: &str, result: Result<Vec<HistoryPoint>, String>) {
        let chart = match result {
            Ok(points) if !points.is_empty() => ChartState::Ready(points),
            Ok(_) => ChartState::Unavailable,
            Err(message) => {
                tracing::debug!(%symbol, error = %message, "chart history unavailable");
                ChartState::Unavailable
            }
        };
        self.charts.insert(symbol.to_string(), chart);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cryptodash_core::domain::recommendation::{Action, Confidence};

    fn price(symbol: &str, value: f64) -> PriceRecord {
        PriceRecord {
            id: symbol.to_lowercase(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: value,
            percent_change_24h: 0.0,
            market_cap: 0.0,
            volume_24h: 0.0,
            last_updated: Utc::now(),
        }
    }

    fn rec(symbol: &str, action: Action) -> Recommendation {
        Recommendation::new(symbol, action, Confidence::Medium, None, "because")
    }

    fn loaded() -> ViewState {
        let mut state = ViewState::default();
        state.apply(Event::Prices(Ok(vec![price("BTC", 1.0), price("ETH", 2.0)])));
        state
    }

    #[test]
    fn first_prices_mount_every_chart_once() {
        let mut state = ViewState::default();
        let mounted = state.apply(Event::Prices(Ok(vec![price("BTC", 1.0), price("ETH", 2.0)])));
        assert_eq!(mounted, vec!["BTC", "ETH"]);
        assert_eq!(state.chart("BTC"), Some(&ChartState::Loading));

        let mounted = state.apply(Event::Prices(Ok(vec![
            price("BTC", 1.5),
            price("ETH", 2.5),
            price("SOL", 3.0),
        ])));
        assert_eq!(mounted, vec!["SOL"]);
        assert_eq!(state.prices()[0].price, 1.5);
    }

    #[test]
    fn price_failure_shows_error_instead_of_stale_data() {
        let mut state = loaded();
        state.apply(Event::Prices(Err("HTTP 500".into())));
        assert!(state.prices().is_empty());
        let msg = state.error().unwrap();
        assert!(!msg.is_empty());
        assert!(msg.contains("HTTP 500"));

        state.apply(Event::Prices(Ok(vec![price("BTC", 1.0)])));
        assert!(state.error().is_none());
    }

    #[test]
    fn in_flight_analysis_refuses_duplicates() {
        let mut state = loaded();
        assert!(state.begin_analysis("BTC"));
        assert!(state.is_analyzing("BTC"));
        assert!(!state.begin_analysis("BTC"));
        assert!(state.begin_analysis("ETH"));

        state.apply(Event::Analysis {
            symbol: "BTC".into(),
            result: Ok(rec("BTC", Action::Buy)),
        });
        assert!(!state.is_analyzing("BTC"));
        assert_eq!(state.recommendation("BTC").unwrap().action, Action::Buy);
        assert!(state.begin_analysis("BTC"));
    }

    #[test]
    fn unknown_symbol_cannot_be_analyzed() {
        let mut state = loaded();
        assert!(!state.begin_analysis("DOGE"));
        assert_eq!(state.error(), Some("Unknown symbol DOGE"));
    }

    #[test]
    fn failed_analysis_keeps_previous_recommendation() {
        let mut state = loaded();
        state.begin_analysis("ETH");
        state.apply(Event::Analysis {
            symbol: "ETH".into(),
            result: Ok(rec("ETH", Action::Sell)),
        });
        state.begin_analysis("ETH");
        state.apply(Event::Analysis {
            symbol: "ETH".into(),
            result: Err("HTTP 500".into()),
        });

        assert!(!state.is_analyzing("ETH"));
        assert_eq!(state.recommendation("ETH").unwrap().action, Action::Sell);
        assert_eq!(state.error(), Some("Failed to analyze ETH: HTTP 500"));
    }

    #[test]
    fn last_resolved_analysis_wins() {
        let mut state = loaded();
        for action in [Action::Buy, Action::Hold] {
            state.apply(Event::Analysis {
                symbol: "BTC".into(),
                result: Ok(rec("BTC", action)),
            });
        }
        assert_eq!(state.recommendation("BTC").unwrap().action, Action::Hold);
    }

    #[test]
    fn chart_failure_degrades_to_unavailable() {
        let mut state = loaded();
        state.apply(Event::Chart {
            symbol: "BTC".into(),
            result: Err("timeout".into()),
        });
        state.apply(Event::Chart {
            symbol: "ETH".into(),
            result: Ok(vec![HistoryPoint {
                date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                price: 2.0,
            }]),
        });
        assert_eq!(state.chart("BTC"), Some(&ChartState::Unavailable));
        assert!(matches!(state.chart("ETH"), Some(ChartState::Ready(p)) if p.len() == 1));
        assert!(state.error().is_none());
    }
}
