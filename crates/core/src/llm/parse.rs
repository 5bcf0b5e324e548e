use crate::domain::recommendation::{Action, Confidence, Recommendation};
use crate::error::GenerationError;
use crate::llm::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Action,
    Confidence,
    Reasoning,
    PriceTarget,
}

#[derive(Debug, Default)]
struct Fields {
    action: Option<String>,
    confidence: Option<String>,
    reasoning: Vec<String>,
    price_target: Option<String>,
}

/// Parses the `KEY: value` completion format into a recommendation for `symbol`.
///
/// Keys may carry list markers or markdown emphasis. `REASONING` may continue over following
/// lines until the next key. Missing or invalid action/confidence, or empty reasoning, is a
/// `GenerationError`; an unparseable target is treated as absent.
pub fn parse_recommendation(
    text: &str,
    symbol: &str,
    provider: Provider,
) -> anyhow::Result<Recommendation> {
    let fields = scan_fields(text);
    let fail =
        |detail: String| GenerationError::new(provider, "parse", detail).with_raw_output(text);

    let action = fields
        .action
        .as_deref()
        .and_then(first_word)
        .ok_or_else(|| fail("missing RECOMMENDATION line".to_string()))?
        .parse::<Action>()
        .map_err(|e| fail(format!("{e}")))?;

    let confidence = fields
        .confidence
        .as_deref()
        .and_then(first_word)
        .ok_or_else(|| fail("missing CONFIDENCE line".to_string()))?
        .parse::<Confidence>()
        .map_err(|e| fail(format!("{e}")))?;

    let reasoning = fields.reasoning.join(" ");
    if reasoning.trim().is_empty() {
        return Err(fail("missing REASONING text".to_string()).into());
    }

    let price_target = fields.price_target.as_deref().and_then(parse_price_target);

    Ok(Recommendation::new(
        symbol,
        action,
        confidence,
        price_target,
        reasoning.trim(),
    ))
}

fn scan_fields(text: &str) -> Fields {
    let mut out = Fields::default();
    let mut current: Option<Field> = None;

    for raw_line in text.lines() {
        let line = strip_decorations(raw_line);
        if line.is_empty() {
            continue;
        }

        if let Some((field, value)) = split_key(line) {
            current = Some(field);
            match field {
                Field::Action => out.action = Some(value.to_string()),
                Field::Confidence => out.confidence = Some(value.to_string()),
                Field::PriceTarget => out.price_target = Some(value.to_string()),
                Field::Reasoning => {
                    out.reasoning.clear();
                    if !value.is_empty() {
                        out.reasoning.push(value.to_string());
                    }
                }
            }
            continue;
        }

        if current == Some(Field::Reasoning) {
            out.reasoning.push(line.to_string());
        }
    }

    out
}

fn split_key(line: &str) -> Option<(Field, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_ascii_uppercase()
        .replace(' ', "_");

    let field = match key.as_str() {
        "RECOMMENDATION" | "ACTION" => Field::Action,
        "CONFIDENCE" | "CONFIDENCE_LEVEL" => Field::Confidence,
        "REASONING" | "RATIONALE" => Field::Reasoning,
        "PRICE_TARGET" | "TARGET_PRICE" => Field::PriceTarget,
        _ => return None,
    };

    let value = value.trim_matches(|c: char| c == '*' || c == '[' || c == ']' || c.is_whitespace());
    Some((field, value))
}

/// Drops leading list markers (`-`, `*`, `1.`) and heading hashes.
fn strip_decorations(line: &str) -> &str {
    let mut s = line.trim();
    s = s.trim_start_matches('#').trim_start();
    if let Some(rest) = s.strip_prefix("- ").or_else(|| s.strip_prefix("• ")) {
        s = rest.trim_start();
    }
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = s[digits..].strip_prefix(". ") {
            s = rest.trim_start();
        }
    }
    s
}

fn first_word(value: &str) -> Option<&str> {
    value
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())
}

/// Accepts plain amounts and `k`/`m`/`b` shorthands (`$72K`, `1.2m`); any other trailing
/// letters make the target unparseable.
fn parse_price_target(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| *c != '$' && *c != ',').collect();
    let token = cleaned
        .split_whitespace()
        .next()?
        .trim_end_matches(['.', ';', ')']);
    if token.eq_ignore_ascii_case("none") || token.eq_ignore_ascii_case("n/a") {
        return None;
    }

    let split = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(token.len());
    let (number, suffix) = token.split_at(split);
    let scale = match suffix.to_ascii_lowercase().as_str() {
        "" => 1.0,
        "k" => 1e3,
        "m" => 1e6,
        "b" => 1e9,
        _ => return None,
    };

    number
        .parse::<f64>()
        .ok()
        .map(|v| v * scale)
        .filter(|v| v.is_finite() && *v >= 0.0)
}
