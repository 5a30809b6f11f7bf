//! Token counting contract used to bound chunk sizes.
//!
//! The chunker measures every candidate piece with the tokenizer of the
//! embedding model, so chunk budgets line up with what the model truncates.
//! Model-backed counters live in `ragdb-infer`; the counters here are
//! model-free approximations.

/// Measures text length in model tokens.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` encodes to, excluding special tokens.
    fn count_tokens(&self, text: &str) -> usize;
}

/// One token per Unicode scalar value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenCounter;

impl TokenCounter for CharTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Approximates a WordPiece vocabulary: every alphanumeric run is one token,
/// plus one token per further 6 characters of that run, and every other
/// non-whitespace character is a token on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenCounter;

impl TokenCounter for WordTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut run = 0usize;
        for c in text.chars() {
            if c.is_alphanumeric() {
                run += 1;
                continue;
            }
            tokens += word_tokens(run);
            run = 0;
            if !c.is_whitespace() {
                tokens += 1;
            }
        }
        tokens + word_tokens(run)
    }
}

fn word_tokens(run: usize) -> usize {
    if run == 0 {
        0
    } else {
        1 + (run - 1) / 6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_counter() {
        assert_eq!(CharTokenCounter.count_tokens("héllo"), 5);
        assert_eq!(CharTokenCounter.count_tokens(""), 0);
    }

    #[test]
    fn test_word_counter_punctuation() {
        assert_eq!(WordTokenCounter.count_tokens("The sky is blue."), 5);
        assert_eq!(WordTokenCounter.count_tokens("   "), 0);
    }

    #[test]
    fn test_word_counter_long_words() {
        // 13 chars → 1 + 12/6 = 3 pieces
        assert_eq!(WordTokenCounter.count_tokens("antidisestabl"), 3);
    }
}
