use serde::Deserialize;
use std::sync::Arc;

/// Characters that make up one token on average in source code.
const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token cost of text.
///
/// Implementations must be deterministic, locale independent and monotonic:
/// appending characters to a text never lowers its estimate. They are shared
/// across render workers, hence `Send + Sync`.
pub trait TokenEstimator: Send + Sync {
    /// Estimates the number of tokens in the given text.
    fn estimate(&self, text: &str) -> usize;
}

/// Built-in estimation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// One token per four characters, rounded up
    #[default]
    Simple,
    /// Blend of word and character counts, plus a surcharge for punctuation
    Enhanced,
}

impl TokenizerKind {
    /// Shares this strategy as an estimator for the render workers.
    #[must_use]
    pub fn create(self) -> Arc<dyn TokenEstimator> {
        Arc::new(self)
    }
}

impl TokenEstimator for TokenizerKind {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let shape = TextShape::measure(text);
        let tokens = match self {
            Self::Simple => shape.chars.div_ceil(CHARS_PER_TOKEN),
            // words * 1.3 and chars / 4 averaged, then one token per ten symbols
            Self::Enhanced => {
                let by_words = shape.words.saturating_mul(13) / 10;
                let by_chars = shape.chars / CHARS_PER_TOKEN;
                by_words.saturating_add(by_chars) / 2 + shape.symbols / 10
            }
        };
        tokens.max(1)
    }
}

/// Counts gathered in a single pass over the text.
///
/// Every counter only grows as characters are appended, which is what keeps
/// both strategies monotonic.
#[derive(Debug, Default, PartialEq, Eq)]
struct TextShape {
    chars: usize,
    words: usize,
    symbols: usize,
}

impl TextShape {
    fn measure(text: &str) -> Self {
        let mut shape = Self::default();
        let mut in_word = false;

        for c in text.chars() {
            shape.chars += 1;
            if c.is_whitespace() {
                in_word = false;
                continue;
            }
            if !in_word {
                shape.words += 1;
                in_word = true;
            }
            if !c.is_alphanumeric() {
                shape.symbols += 1;
            }
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [TokenizerKind; 2] = [TokenizerKind::Simple, TokenizerKind::Enhanced];

    #[test]
    fn test_empty_text_costs_nothing() {
        for kind in KINDS {
            assert_eq!(kind.estimate(""), 0);
        }
    }

    #[test]
    fn test_any_text_costs_at_least_one() {
        for kind in KINDS {
            assert_eq!(kind.estimate(" "), 1);
        }
    }

    #[test]
    fn test_simple_rounds_up_per_four_chars() {
        assert_eq!(TokenizerKind::Simple.estimate("abcd"), 1);
        assert_eq!(TokenizerKind::Simple.estimate("abcde"), 2);
        assert_eq!(TokenizerKind::Simple.estimate(&"x".repeat(4_000)), 1_000);
    }

    #[test]
    fn test_simple_counts_chars_not_bytes() {
        assert_eq!(TokenizerKind::Simple.estimate("ééééé"), 2);
        assert_eq!(TokenizerKind::Simple.estimate("日本語の"), 1);
    }

    #[test]
    fn test_enhanced_charges_for_symbols() {
        let plain = TokenizerKind::Enhanced.estimate(&"a".repeat(20));
        let dense = TokenizerKind::Enhanced.estimate(&"!".repeat(20));
        assert_eq!(plain, 3);
        assert_eq!(dense, 5);
    }

    #[test]
    fn test_measure() {
        assert_eq!(
            TextShape::measure("  fn main() {}\n"),
            TextShape {
                chars: 15,
                words: 3,
                symbols: 4,
            }
        );
    }

    #[test]
    fn test_estimates_never_drop_when_text_grows() {
        let text = "fn main() {\n    let x = vec![1, 2, 3];\n    println!(\"{x:?}\"); // ünïcödé\n}\n";
        for kind in KINDS {
            let mut previous = 0;
            for (idx, _) in text.char_indices().skip(1) {
                let current = kind.estimate(&text[..idx]);
                assert!(current >= previous, "{kind:?} dropped at byte {idx}");
                previous = current;
            }
            assert!(kind.estimate(text) >= previous);
        }
    }

    #[test]
    fn test_shared_estimator_matches_kind() {
        let text = "The quick brown fox jumps over the lazy dog.";
        for kind in KINDS {
            assert_eq!(kind.create().estimate(text), kind.estimate(text));
        }
    }
}
