//! Token usage normalization and estimation
//!
//! Completion servers disagree on how they spell usage fields. Everything
//! here is a pure function over `serde_json::Value` that tolerates those
//! spellings, coerces numeric strings, and never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROMPT_KEYS: [&str; 4] = ["prompt_tokens", "promptTokens", "input_tokens", "inputTokens"];
const COMPLETION_KEYS: [&str; 4] = [
    "completion_tokens",
    "completionTokens",
    "output_tokens",
    "outputTokens",
];
const TOTAL_KEYS: [&str; 2] = ["total_tokens", "totalTokens"];
const COST_KEYS: [&str; 3] = ["cost", "total_cost", "totalCost"];

/// Token accounting for one completion
///
/// When `estimated` is true the counts come from [`estimate_tokens`], not
/// from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Tokens in the generated completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Total tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Whether the counts are local estimates
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub estimated: bool,
}

impl Usage {
    /// Total tokens, falling back to prompt + completion when either is known
    ///
    /// # Examples
    ///
    /// ```
    /// use polychat::engine::Usage;
    ///
    /// let usage = Usage { prompt_tokens: Some(10), ..Default::default() };
    /// assert_eq!(usage.effective_total(), Some(10));
    /// assert_eq!(Usage::default().effective_total(), None);
    /// ```
    pub fn effective_total(&self) -> Option<u64> {
        self.total_tokens.or_else(|| {
            if self.prompt_tokens.is_some() || self.completion_tokens.is_some() {
                Some(
                    self.prompt_tokens
                        .unwrap_or(0)
                        .saturating_add(self.completion_tokens.unwrap_or(0)),
                )
            } else {
                None
            }
        })
    }

    /// Heuristic usage for a prompt and its completion
    pub fn estimate<'a>(prompt: impl IntoIterator<Item = &'a str>, completion: &str) -> Self {
        let prompt_tokens: u64 = prompt.into_iter().map(estimate_tokens).sum();
        let completion_tokens = estimate_tokens(completion);
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens.saturating_add(completion_tokens)),
            estimated: true,
        }
    }
}

/// Rough token count: a quarter of the trimmed character count, rounded up
///
/// Empty (or whitespace-only) text is 0 tokens; any other text is at least 1.
///
/// # Examples
///
/// ```
/// use polychat::engine::usage::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("  hi  "), 1);
/// assert_eq!(estimate_tokens("abcdefghi"), 3);
/// ```
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.trim().chars().count() as u64;
    if chars == 0 {
        0
    } else {
        ((chars + 3) / 4).max(1)
    }
}

/// Extract a canonical [`Usage`] from an arbitrary JSON object
///
/// Accepts snake_case and camelCase spellings as well as the
/// `input`/`output` naming. Returns `None` when none of prompt, completion
/// or total is present. When total is missing but both prompt and
/// completion are present, total is their sum.
///
/// # Examples
///
/// ```
/// use polychat::engine::usage::normalize_usage;
/// use serde_json::json;
///
/// let usage = normalize_usage(&json!({"inputTokens": "12", "completion_tokens": 30})).unwrap();
/// assert_eq!(usage.prompt_tokens, Some(12));
/// assert_eq!(usage.total_tokens, Some(42));
/// assert!(normalize_usage(&json!({"foo": 1})).is_none());
/// ```
pub fn normalize_usage(value: &Value) -> Option<Usage> {
    let object = value.as_object()?;

    let pick = |keys: &[&str]| keys.iter().find_map(|k| object.get(*k).and_then(coerce_count));

    let prompt_tokens = pick(&PROMPT_KEYS);
    let completion_tokens = pick(&COMPLETION_KEYS);
    let mut total_tokens = pick(&TOTAL_KEYS);

    if prompt_tokens.is_none() && completion_tokens.is_none() && total_tokens.is_none() {
        return None;
    }

    if total_tokens.is_none() {
        if let (Some(p), Some(c)) = (prompt_tokens, completion_tokens) {
            total_tokens = Some(p.saturating_add(c));
        }
    }

    Some(Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
        estimated: false,
    })
}

/// Find a cost figure in a stream payload
///
/// Looks at the top-level `cost`/`total_cost`/`totalCost` fields first, then
/// at the same keys inside the payload's `usage` object.
pub fn extract_cost(payload: &Value) -> Option<f64> {
    let from = |object: &Value| COST_KEYS.iter().find_map(|k| object.get(*k).and_then(coerce_cost));

    from(payload).or_else(|| payload.get("usage").and_then(from))
}

/// Coerce a JSON number or numeric string into a non-negative integer count
fn coerce_count(value: &Value) -> Option<u64> {
    let number = coerce_f64(value)?;
    if number < 0.0 {
        return None;
    }
    Some(number.trunc() as u64)
}

fn coerce_cost(value: &Value) -> Option<f64> {
    coerce_f64(value).filter(|c| *c >= 0.0)
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
