/// Tickers tracked when `CRYPTO_SYMBOLS` is not set, in display order.
pub const DEFAULT_SYMBOLS: [&str; 15] = [
    "BTC", "ETH", "XRP", "BNB", "SOL", "DOGE", "TRX", "ADA", "HYPE", "LINK", "XLM", "BCH", "HBAR",
    "AVAX", "LTC",
];

pub fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

/// Parses a comma-separated ticker list. Entries are trimmed and upper-cased; duplicates keep
/// their first position. Returns `None` if nothing usable remains.
pub fn parse_symbol_list(raw: &str) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let sym = normalize_symbol(part);
        if sym.is_empty() || out.contains(&sym) {
            continue;
        }
        out.push(sym);
    }
    (!out.is_empty()).then_some(out)
}

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_has_fifteen_unique_tickers() {
        let syms = default_symbols();
        assert_eq!(syms.len(), 15);
        let mut dedup = syms.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 15);
    }

    #[test]
    fn parse_normalizes_and_dedups() {
        let syms = parse_symbol_list(" btc,ETH , eth,,sol").unwrap();
        assert_eq!(syms, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn parse_rejects_empty_list() {
        assert!(parse_symbol_list(" , ,").is_none());
    }
}
