// File: src/core/resolver.rs

/// Placeholder returned for values with no usable alternative. A single
/// space keeps the token non-empty so later joining has a position for it.
pub const BLANK_PLACEHOLDER: &str = " ";

/// Picks the display translation out of a raw dictionary value.
///
/// `的=/như thế/đích` -> `như thế`, `a|b|c` -> `a`, `` -> ` `.
/// Everything up to the first `=` is a disambiguation tag and is dropped;
/// `|` and `/` both separate alternatives. Literal `\n` and tab sequences
/// inside the chosen alternative are left untouched.
pub fn resolve(raw_value: &str) -> String {
    let value = match raw_value.split_once('=') {
        Some((_, rest)) => rest,
        None => raw_value,
    };

    value
        .split(['/', '|'])
        .map(str::trim)
        .find(|part| !part.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| BLANK_PLACEHOLDER.to_string())
}
