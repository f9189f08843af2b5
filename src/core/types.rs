// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the dictionaries an engine dataset is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DictionarySlot {
    Names2,
    Names,
    VietPhrase,
    /// Single-character Hán Việt readings.
    PhienAm,
    Cedict,
}

impl DictionarySlot {
    /// Phrase dictionaries in segmentation priority order.
    pub const PHRASE_ORDER: [DictionarySlot; 3] =
        [DictionarySlot::Names2, DictionarySlot::Names, DictionarySlot::VietPhrase];

    pub const ALL: [DictionarySlot; 5] = [
        DictionarySlot::Names2,
        DictionarySlot::Names,
        DictionarySlot::VietPhrase,
        DictionarySlot::PhienAm,
        DictionarySlot::Cedict,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DictionarySlot::Names2 => "Names2",
            DictionarySlot::Names => "Names",
            DictionarySlot::VietPhrase => "VietPhrase",
            DictionarySlot::PhienAm => "ChinesePhienAmWords",
            DictionarySlot::Cedict => "Cedict",
        }
    }

    /// Whether a missing file for this slot aborts the load.
    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            DictionarySlot::Names | DictionarySlot::VietPhrase | DictionarySlot::PhienAm
        )
    }
}

impl fmt::Display for DictionarySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which segmentation rule produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Latin,
    Dictionary(DictionarySlot),
    Fallback,
    Literal,
}

/// A unit emitted by the segmenter, before rephrasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub original: String,
    pub translated: String,
    /// Char offset of `original` in the segmented text.
    pub source_start: usize,
    /// Char offset of `translated` in the raw token concatenation.
    pub raw_start: usize,
    pub kind: TokenKind,
}

/// A parsed CC-CEDICT line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CedictEntry {
    pub traditional: String,
    pub simplified: String,
    pub pinyin: String,
    pub definition: String,
}

impl fmt::Display for CedictEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.traditional != self.simplified {
            write!(f, "{}/{} ", self.traditional, self.simplified)?;
        } else {
            write!(f, "{} ", self.traditional)?;
        }
        write!(f, "[{}] {}", self.pinyin, self.definition)
    }
}
