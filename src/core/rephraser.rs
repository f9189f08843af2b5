// File: src/core/rephraser.rs
use crate::core::mapping::TranslationMapping;
use crate::core::types::Token;

/// Tokens made only of these never take a leading space and are never
/// capitalized.
const PUNCTUATION: &[char] = &[
    '"', '\'', '“', '”', '‘', '’', '«', '»', '[', ']', '{', '}', '(', ')', ' ', ',', '!', '?', ';', '.',
];
/// Quote marks spaced like words. The rest of `PUNCTUATION` attaches to
/// what precedes it.
const SPACED_OPENERS: &[char] = &['“', '‘', '«', '»', '('];
const OPENING_MARKS: &[char] = &['[', '“', '‘'];
const CLOSING_MARKS: &[char] = &[']', '”', '’'];
/// Followed by exactly one space and a capital.
const SPACED_MARKS: &[char] = &['?', '!', '⟨', ':', '«'];
/// Never preceded by whitespace.
const TIGHT_MARKS: &[char] = &[';', ':', '?', '!', '.'];

fn is_punctuation_only(token: &str) -> bool {
    token.chars().all(|c| PUNCTUATION.contains(&c) || c.is_whitespace())
}

fn attaches_left(token: &str) -> bool {
    !token.starts_with(SPACED_OPENERS)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Uppercase of `c` when it maps to exactly one char; multi-char
/// expansions would shift every later offset, so those stay as they are.
fn upper(c: char) -> char {
    let mut mapped = c.to_uppercase();
    match (mapped.next(), mapped.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

fn capitalize_first(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            let mut out = String::with_capacity(token.len());
            out.push(upper(first));
            out.push_str(chars.as_str());
            out
        }
        _ => token.to_string(),
    }
}

/// True when `text` ends a sentence: `!`, `?`, or a lone `.` (not `..`).
fn ends_sentence(text: &str) -> bool {
    let tail = text.trim_end();
    tail.ends_with('!') || tail.ends_with('?') || (tail.ends_with('.') && !tail.ends_with(".."))
}

/// Joins tokens into prose.
///
/// Word tokens are separated by one space unless they follow a blank
/// token, which is kept verbatim. Punctuation tokens attach to what
/// precedes them, except opening quotes which are spaced like words but
/// never take the capital. The first word, and the first word after a
/// sentence end, get an uppercase first letter.
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut capitalize_next = true;
    let mut last_blank = false;

    for token in tokens {
        let text = token.translated.as_str();
        if text.trim().is_empty() {
            out.push_str(text);
            last_blank = true;
            continue;
        }

        if is_punctuation_only(text) {
            if !attaches_left(text) && !out.is_empty() && !last_blank {
                out.push(' ');
            }
            out.push_str(text);
        } else {
            if !out.is_empty() && !last_blank {
                out.push(' ');
            }
            if capitalize_next {
                out.push_str(&capitalize_first(text));
                capitalize_next = false;
            } else {
                out.push_str(text);
            }
        }
        last_blank = false;

        if ends_sentence(&out) {
            capitalize_next = true;
        } else if out.ends_with("..") {
            capitalize_next = false;
        }
    }
    out
}

// --- Punctuation passes. Each runs over the output of the previous one. ---

/// `“ xin` -> `“Xin`: drop whitespace after an opening mark, capitalize.
fn tighten_openers(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if OPENING_MARKS.contains(&c) {
            let j = skip_whitespace(chars, i);
            if j < chars.len() && is_word_char(chars[j]) {
                out.push(upper(chars[j]));
                i = j + 1;
            }
        }
    }
    out
}

/// Drops any whitespace run directly followed by one of `marks`.
fn drop_space_before(chars: &[char], marks: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            let j = skip_whitespace(chars, i);
            if j < chars.len() && marks.contains(&chars[j]) {
                i = j;
                continue;
            }
            out.extend_from_slice(&chars[i..j]);
            i = j;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// `? xin` -> `? Xin`: collapse the gap after `?!⟨:«` to one space when a
/// word follows, and capitalize it.
fn space_after_marks(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if SPACED_MARKS.contains(&c) {
            let j = skip_whitespace(chars, i);
            if j > i && j < chars.len() && is_word_char(chars[j]) {
                out.push(' ');
                out.push(upper(chars[j]));
                i = j + 1;
            }
        }
    }
    out
}

/// `. xin` -> `. Xin` for a lone period; ellipses are left alone.
fn capitalize_after_period(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        let lone = c == '.' && (i < 2 || chars[i - 2] != '.') && chars.get(i) != Some(&'.');
        if lone {
            let j = skip_whitespace(chars, i);
            if j > i && j < chars.len() && is_word_char(chars[j]) {
                out.push(' ');
                out.push(upper(chars[j]));
                i = j + 1;
            }
        }
    }
    out
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Applies the spacing and capitalization rules around punctuation.
pub fn normalize_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let chars = tighten_openers(&chars);
    let chars = drop_space_before(&chars, CLOSING_MARKS);
    let chars = space_after_marks(&chars);
    let chars = drop_space_before(&chars, TIGHT_MARKS);
    let chars = capitalize_after_period(&chars);
    chars.into_iter().collect()
}

/// Produces the final prose for `tokens` and re-anchors `mapping` on it.
pub fn rephrase(tokens: &[Token], mapping: &mut TranslationMapping) -> String {
    let text = normalize_punctuation(&join_tokens(tokens));
    mapping.relocate(&text);
    text
}
