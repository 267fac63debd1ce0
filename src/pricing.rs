//! Token and cost labels for finalized replies

use crate::chat::{Message, Role};

/// Format a USD amount: four decimals below one cent, two otherwise
///
/// # Examples
///
/// ```
/// use polychat::pricing::format_usd;
///
/// assert_eq!(format_usd(0.00123), "$0.0012");
/// assert_eq!(format_usd(1.5), "$1.50");
/// ```
pub fn format_usd(value: f64) -> String {
    if value < 0.01 {
        format!("${:.4}", value)
    } else {
        format!("${:.2}", value)
    }
}

/// Whether a model id names a free variant
pub fn is_free_model(model: &str) -> bool {
    model.contains(":free")
}

/// Cost label for a message
///
/// Server cost wins. Free models cost `$0.00`. Otherwise, with a configured
/// cost per 1000 tokens and a known token total, an estimate prefixed with
/// `~`.
pub fn cost_label(message: &Message, cost_per_1k: Option<f64>) -> Option<String> {
    if let Some(cost) = message.cost_usd {
        return Some(format_usd(cost));
    }
    if message.model.as_deref().map_or(false, is_free_model) {
        return Some("$0.00".to_string());
    }

    let per_1k = cost_per_1k.filter(|c| c.is_finite() && *c >= 0.0)?;
    let total = message.usage?.effective_total()?;
    Some(format!("~{}", format_usd(total as f64 / 1000.0 * per_1k)))
}

/// Token label such as `Tokens: ~42 tok (30 in / 12 out)`
pub fn token_label(message: &Message) -> Option<String> {
    let usage = message.usage?;
    let total = usage.effective_total()?;

    let mut label = format!(
        "Tokens: {}{} tok",
        if usage.estimated { "~" } else { "" },
        total
    );
    if usage.prompt_tokens.is_some() || usage.completion_tokens.is_some() {
        label.push_str(&format!(
            " ({} in / {} out)",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0)
        ));
    }
    Some(label)
}

/// Combined usage line for a non-user message
pub fn meta_label(message: &Message, cost_per_1k: Option<f64>) -> Option<String> {
    if message.role == Role::User {
        return None;
    }
    let parts: Vec<String> = [
        token_label(message),
        cost_label(message, cost_per_1k).map(|c| format!("Cost: {}", c)),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" • "))
    }
}
