use crate::domain::price::{group_thousands, PriceRecord};

pub fn system_prompt() -> String {
    [
        "You are a professional cryptocurrency investment analyst.",
        "Provide balanced, data-driven investment recommendations with appropriate risk warnings.",
        "Always answer in the exact line format requested, one field per line, no markdown.",
    ]
    .join("\n")
}

pub fn user_prompt(price: &PriceRecord) -> String {
    format!(
        "As a crypto investment analyst, analyze {name} ({symbol}) \
and provide a recommendation.\n\n\
Current Data:\n\
- Price: ${price:.4}\n\
- 24h Change: {change:.2}%\n\
- Market Cap: ${market_cap}\n\
- 24h Volume: ${volume}\n\n\
Please provide:\n\
1. Recommendation (BUY/HOLD/SELL)\n\
2. Confidence level (HIGH/MEDIUM/LOW)\n\
3. Brief reasoning (2-3 sentences)\n\
4. Price target for next 7 days (optional)\n\n\
Format your response as:\n\
RECOMMENDATION: [BUY/HOLD/SELL]\n\
CONFIDENCE: [HIGH/MEDIUM/LOW]\n\
REASONING: [Your analysis]\n\
PRICE_TARGET: [Dollar amount or NONE]\n\n\
Consider market trends, technical indicators, and risk factors. Always include risk disclaimers.",
        name = price.name,
        symbol = price.symbol,
        price = price.price,
        change = price.percent_change_24h,
        market_cap = group_thousands(price.market_cap),
        volume = group_thousands(price.volume_24h),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn user_prompt_embeds_market_snapshot() {
        let price = PriceRecord {
            id: "1".into(),
            symbol: "BTC".into(),
            name: "Bitcoin".into(),
            price: 65000.123456,
            percent_change_24h: -2.5,
            market_cap: 1_280_000_000_000.0,
            volume_24h: 35_000_000_000.0,
            last_updated: Utc.with_ymd_and_hms(2026, 1, 27, 10, 0, 0).unwrap(),
        };
        let prompt = user_prompt(&price);
        assert!(prompt.contains("Bitcoin (BTC)"));
        assert!(prompt.contains("- Price: $65000.1235"));
        assert!(prompt.contains("- 24h Change: -2.50%"));
        assert!(prompt.contains("- Market Cap: $1,280,000,000,000"));
        assert!(prompt.contains("PRICE_TARGET:"));
    }
}
