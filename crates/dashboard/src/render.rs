use std::fmt::Write as _;

use cryptodash_core::domain::price::{group_thousands, HistoryPoint, PriceRecord};

use crate::state::{ChartState, ViewState};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn render(state: &ViewState) -> String {
    let mut out = String::new();

    let updated = state
        .last_refresh()
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "Crypto dashboard | last refresh {updated}");

    if let Some(err) = state.error() {
        let _ = writeln!(out, "! {err}");
    }
    let _ = writeln!(out);

    if state.prices().is_empty() {
        let _ = writeln!(out, "  (no prices loaded)");
    }

    for price in state.prices() {
        render_card(&mut out, state, price);
    }

    let _ = writeln!(out, "commands: analyze <SYMBOL> | refresh | quit");
    out
}

fn render_card(out: &mut String, state: &ViewState, price: &PriceRecord) {
    let _ = writeln!(
        out,
        "{:<6} {:<20} {:>16} {:>9}",
        price.symbol,
        truncate_chars(&price.name, 20),
        format_price(price.price),
        format_change(price.percent_change_24h),
    );

    let chart = match state.chart(&price.symbol) {
        Some(ChartState::Ready(points)) => sparkline(points),
        Some(ChartState::Loading) => "chart loading...".to_string(),
        Some(ChartState::Unavailable) | None => "chart unavailable".to_string(),
    };
    let _ = writeln!(
        out,
        "       {chart}   mcap ${}  vol ${}",
        group_thousands(price.market_cap),
        group_thousands(price.volume_24h)
    );

    if state.is_analyzing(&price.symbol) {
        let _ = writeln!(out, "       AI: analyzing...");
    } else if let Some(rec) = state.recommendation(&price.symbol) {
        let target = rec
            .price_target
            .map(|t| format!(" target {}", format_price(t)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "       AI: {} ({}){target} | {}",
            rec.action, rec.confidence, rec.reasoning
        );
    }
    let _ = writeln!(out);
}

/// Two decimals with grouping from 1 up; six significant-ish decimals below.
pub fn format_price(value: f64) -> String {
    if value >= 1.0 {
        let whole = value.trunc();
        let cents = ((value - whole) * 100.0).round();
        // Rounding .995 up carries into the whole part.
        let (whole, cents) = if cents >= 100.0 {
            (whole + 1.0, 0.0)
        } else {
            (whole, cents)
        };
        format!("${}.{:02}", group_thousands(whole), cents as u64)
    } else {
        format!("${value:.6}")
    }
}

pub fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

/// One block character per point, scaled between the series min and max.
pub fn sparkline(points: &[HistoryPoint]) -> String {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.price), hi.max(p.price))
        });
    let span = max - min;

    points
        .iter()
        .map(|p| {
            if !span.is_finite() || span <= 0.0 {
                return SPARK_LEVELS[3];
            }
            let idx = ((p.price - min) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
