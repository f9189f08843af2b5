// File: src/core/segmenter.rs
use crate::core::charset::{is_latin, substitute};
use crate::core::dataset::EngineDataset;
use crate::core::mapping::TranslationMapping;
use crate::core::resolver::resolve;
use crate::core::types::{DictionarySlot, Token, TokenKind};

/// Greedy left-to-right tokenizer over a dataset.
///
/// At each position the first rule that matches wins: Latin run, Names2,
/// Names, VietPhrase (longest prefix each), single-char reading, and
/// finally the char itself. Name dictionaries come before VietPhrase so a
/// named entity is never split into generic phrases.
pub struct Segmenter<'a> {
    dataset: &'a EngineDataset,
}

impl<'a> Segmenter<'a> {
    pub fn new(dataset: &'a EngineDataset) -> Self {
        Self { dataset }
    }

    /// Splits `text` into tokens, recording one block per token in `mapping`.
    pub fn segment(&self, text: &str, mapping: &mut TranslationMapping) -> Vec<Token> {
        let source: Vec<char> = text.chars().collect();
        let work: Vec<char> = source.iter().copied().map(substitute).collect();

        let mut tokens = Vec::new();
        let mut i = 0;
        while i < work.len() {
            let (len, translated, kind) = self.step(&work, i);
            let original: String = source[i..i + len].iter().collect();

            let block = mapping.add_block(&original, &translated);
            let raw_start = mapping.blocks()[block].trans_start;
            tokens.push(Token { original, translated, source_start: i, raw_start, kind });
            i += len;
        }
        tokens
    }

    /// Match length (always >= 1), translation and rule at `i`.
    fn step(&self, work: &[char], i: usize) -> (usize, String, TokenKind) {
        if is_latin(work[i]) {
            let len = work[i..].iter().take_while(|&&c| is_latin(c)).count();
            return (len, work[i..i + len].iter().collect(), TokenKind::Latin);
        }

        for slot in DictionarySlot::PHRASE_ORDER {
            let Some(trie) = self.dataset.phrase_trie(slot) else { continue };
            if let (len @ 1.., Some(value)) = trie.find_longest_prefix(work, i) {
                return (len, resolve(value), TokenKind::Dictionary(slot));
            }
        }

        if let Some(reading) = self.dataset.fallback(work[i]) {
            return (1, reading.to_string(), TokenKind::Fallback);
        }

        (1, work[i].to_string(), TokenKind::Literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> EngineDataset {
        EngineDataset::builder()
            .names2(&[("雪乃", "Yukino")])
            .names(&[("雪之下", "Tuyết Chi Hạ"), ("雪乃酱", "Yukino-chan")])
            .viet_phrase(&[("的", "的=/của/đích"), ("学生", "học sinh"), ("雪之", "tuyết chi"), ("", "never")])
            .phien_am(&[('雪', "tuyết"), ('同', "đồng")])
            .build()
    }

    fn translate(text: &str) -> (Vec<Token>, TranslationMapping) {
        let dataset = dataset();
        let mut mapping = TranslationMapping::new();
        let tokens = Segmenter::new(&dataset).segment(text, &mut mapping);
        (tokens, mapping)
    }

    fn translations(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.translated.as_str()).collect()
    }

    #[test]
    fn names_take_priority_over_phrases() {
        let (tokens, _) = translate("雪之下的学生");
        assert_eq!(translations(&tokens), vec!["Tuyết Chi Hạ", "của", "học sinh"]);
        assert_eq!(tokens[0].kind, TokenKind::Dictionary(DictionarySlot::Names));
        assert_eq!(tokens[1].kind, TokenKind::Dictionary(DictionarySlot::VietPhrase));
    }

    #[test]
    fn names2_beats_names_even_when_shorter() {
        let (tokens, _) = translate("雪乃酱");
        assert_eq!(tokens[0].translated, "Yukino");
        assert_eq!(tokens[0].kind, TokenKind::Dictionary(DictionarySlot::Names2));
        assert_eq!(tokens[1].kind, TokenKind::Literal);
    }

    #[test]
    fn latin_runs_stay_whole() {
        let (tokens, _) = translate("一年级a班Việt100分");
        let latin: Vec<&str> =
            tokens.iter().filter(|t| t.kind == TokenKind::Latin).map(|t| t.translated.as_str()).collect();
        assert_eq!(latin, vec!["a", "Việt100"]);
    }

    #[test]
    fn fallback_then_literal() {
        let (tokens, _) = translate("雪同学，");
        // "学生" needs the next char, so 学 falls through to itself.
        assert_eq!(translations(&tokens), vec!["tuyết", "đồng", "学", ","]);
        assert_eq!(tokens[0].kind, TokenKind::Fallback);
        assert_eq!(tokens[2].kind, TokenKind::Literal);
        // Substituted punctuation keeps the source char as original.
        assert_eq!(tokens[3].original, "，");
    }

    #[test]
    fn blocks_tile_original_and_raw_output() {
        let text = "雪之下的学生，雪乃酱abc同学!";
        let (tokens, mapping) = translate(text);

        let original: String = mapping.blocks().iter().map(|b| b.original.as_str()).collect();
        assert_eq!(original, text);

        let raw: String = tokens.iter().map(|t| t.translated.as_str()).collect();
        let from_blocks: String = mapping.blocks().iter().map(|b| b.translated.as_str()).collect();
        assert_eq!(raw, from_blocks);

        for (token, block) in tokens.iter().zip(mapping.blocks()) {
            assert_eq!(token.source_start, block.orig_start);
            assert_eq!(token.raw_start, block.trans_start);
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (tokens, mapping) = translate("");
        assert!(tokens.is_empty());
        assert!(mapping.is_empty());
    }
}
