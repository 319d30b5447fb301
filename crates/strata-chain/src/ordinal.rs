//! Ordinal rendering for positional diagnostics ("1st", "2nd", ...).

/// Turns a 1-based position into its ordinal string.
pub(crate) fn ordinalize(number: usize) -> String {
    format!("{number}{}", ordinal(number))
}

fn ordinal(number: usize) -> &'static str {
    match number % 100 {
        11..=13 => "th",
        _ => match number % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}
