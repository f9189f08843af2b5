// File: src/core/charset.rs

const VIETNAMESE_LOWER: &str = "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ";
const VIETNAMESE_UPPER: &str = "ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴÈÉẸẺẼÊỀẾỆỂỄÌÍỊỈĨÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠÙÚỤỦŨƯỪỨỰỬỮỲÝỴỶỸĐ";
const WESTERN_ACCENTED: &str = "îûñäëïöüÿçßÎÛÑÄËÏÖÜŸÇ";

/// Characters copied verbatim as part of a Latin run: ASCII letters and
/// digits, Vietnamese letters and the common Western European accents.
pub fn is_latin(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || VIETNAMESE_LOWER.contains(c)
        || VIETNAMESE_UPPER.contains(c)
        || WESTERN_ACCENTED.contains(c)
}

/// Fixed replacement of full-width Han punctuation by its Vietnamese
/// typographic equivalent. Always one char for one char, so offsets in the
/// substituted text equal offsets in the source.
pub fn substitute(c: char) -> char {
    match c {
        '，' | '、' => ',',
        '。' | '｡' => '.',
        '！' => '!',
        '？' => '?',
        '；' => ';',
        '：' => ':',
        '（' => '(',
        '）' => ')',
        '［' | '【' => '[',
        '］' | '】' => ']',
        '｛' => '{',
        '｝' => '}',
        '《' | '〈' => '«',
        '》' | '〉' => '»',
        '「' => '“',
        '」' => '”',
        '『' => '‘',
        '』' => '’',
        '～' => '~',
        '　' => ' ',
        '＂' => '"',
        '＇' => '\'',
        '－' => '-',
        '＆' => '&',
        '％' => '%',
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        _ => c,
    }
}

/// Applies [`substitute`] to every char of `text`.
pub fn substitute_all(text: &str) -> String {
    text.chars().map(substitute).collect()
}
