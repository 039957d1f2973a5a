/// Round to two decimals, halves away from zero
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Render a token count: plain below 1000, then `K` and `M` with two decimals.
///
/// The unit is picked before rounding, so 999999 renders as `1000.00K`.
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        scaled(tokens, 1_000_000, "M")
    } else if tokens >= 1000 {
        scaled(tokens, 1000, "K")
    } else {
        tokens.to_string()
    }
}

/// `tokens / unit` with two decimals, halves rounded up in integer arithmetic
fn scaled(tokens: u64, unit: u64, suffix: &str) -> String {
    let hundredths = (u128::from(tokens) * 100 + u128::from(unit / 2)) / u128::from(unit);
    format!("{}.{:02}{}", hundredths / 100, hundredths % 100, suffix)
}

/// Render a cost as a parenthesized suffix; empty for zero, cents below $0.01
pub fn format_cost(cost: f64) -> String {
    if cost == 0.0 {
        String::new()
    } else if cost < 0.01 {
        format!(" (${:.2}¢)", round2(cost * 100.0))
    } else {
        format!(" (${:.2})", round2(cost))
    }
}

/// Plain dollar amount, e.g. `$4.25`
pub fn format_dollars(amount: f64) -> String {
    format!("${:.2}", round2(amount))
}

/// `<tokens> tokens<cost>` as shown in the status lines
pub fn format_usage(tokens: u64, cost: f64, show_cost: bool) -> String {
    let cost = if show_cost {
        format_cost(cost)
    } else {
        String::new()
    };
    format!("{} tokens{}", format_tokens(tokens), cost)
}
